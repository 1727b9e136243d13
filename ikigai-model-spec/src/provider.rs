//! Provider classification: `infer_provider` is a pure function over model-name
//! prefixes (spec §8 "Provider inference").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }

    /// Canonical environment variable that carries this provider's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Google => "GOOGLE_API_KEY",
        }
    }
}

pub fn provider_list() -> &'static [Provider] {
    &[Provider::OpenAI, Provider::Anthropic, Provider::Google]
}

/// Classifies a model name into a provider by prefix. Pure function, no I/O.
pub fn infer_provider(model: &str) -> Option<Provider> {
    let m = model.to_ascii_lowercase();
    if m.starts_with("gpt-") || m.starts_with("o1") || m.starts_with("o3") || m.starts_with("o4") {
        Some(Provider::OpenAI)
    } else if m.starts_with("claude") {
        Some(Provider::Anthropic)
    } else if m.starts_with("gemini") {
        Some(Provider::Google)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_known_prefixes() {
        assert_eq!(infer_provider("gpt-5"), Some(Provider::OpenAI));
        assert_eq!(infer_provider("o3-mini"), Some(Provider::OpenAI));
        assert_eq!(infer_provider("claude-sonnet-4-5"), Some(Provider::Anthropic));
        assert_eq!(infer_provider("gemini-2.5-pro"), Some(Provider::Google));
    }

    #[test]
    fn unknown_prefix_is_none() {
        assert_eq!(infer_provider("llama-3"), None);
    }

    #[test]
    fn provider_list_covers_known_models() {
        let known = ["gpt-5", "claude-sonnet-4-5", "gemini-2.5-pro"];
        for m in known {
            let p = infer_provider(m).unwrap();
            assert!(provider_list().contains(&p));
        }
    }
}
