//! Static provider registry, credential resolution, and factory dispatch
//! (spec §4.11).

use std::sync::Arc;

use ikigai_config::Credentials;

use super::{AnthropicProvider, GoogleProvider, OpenAIProvider, Provider};
use crate::error::{Category, Error, Result};

const NAMES: &[&str] = &["openai", "anthropic", "google"];

/// Exact, case-sensitive membership check (spec §4.11 `ik_provider_is_valid`).
pub fn is_valid(name: &str) -> bool {
    NAMES.contains(&name)
}

pub fn list() -> &'static [&'static str] {
    NAMES
}

fn env_var_for(name: &str) -> &'static str {
    match name {
        "openai" => "OPENAI_API_KEY",
        "anthropic" => "ANTHROPIC_API_KEY",
        "google" => "GOOGLE_API_KEY",
        _ => unreachable!("validated by is_valid before lookup"),
    }
}

/// Resolves an API key by precedence: environment variable first, then the
/// credentials-file entry (spec §4.11 step 3).
fn resolve_api_key(name: &str, credentials: &Credentials) -> Result<String> {
    let env_var = env_var_for(name);
    if let Ok(v) = std::env::var(env_var) {
        if !v.is_empty() {
            return Ok(v);
        }
    }
    if let Some(key) = credentials.api_key(name) {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }
    Err(Error::new(
        Category::MissingCredentials,
        format!("no API key for provider `{}`; set {}", name, env_var),
    ))
}

/// Creates a provider instance by name (spec §4.11 `ik_provider_create`).
///
/// Step 2 ("load credentials, parse errors downgrade to a warning") is the
/// caller's job via [`ikigai_config::load_credentials`], which already never
/// fails; this function only resolves the key and dispatches the factory.
pub fn create(name: &str, credentials: &Credentials) -> Result<Arc<dyn Provider>> {
    if !is_valid(name) {
        return Err(Error::new(Category::InvalidArg, format!("unknown provider `{}`", name)));
    }
    let api_key = resolve_api_key(name, credentials)?;
    Ok(match name {
        "openai" => Arc::new(OpenAIProvider::new(api_key)) as Arc<dyn Provider>,
        "anthropic" => Arc::new(AnthropicProvider::new(api_key)) as Arc<dyn Provider>,
        "google" => Arc::new(GoogleProvider::new(api_key)) as Arc<dyn Provider>,
        _ => unreachable!(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_valid_is_exact_and_case_sensitive() {
        assert!(is_valid("openai"));
        assert!(!is_valid("OpenAI"));
        assert!(!is_valid("bogus"));
    }

    #[test]
    fn unknown_provider_is_invalid_arg() {
        let creds = Credentials::default();
        let err = create("bogus", &creds).unwrap_err();
        assert_eq!(err.category, Category::InvalidArg);
    }

    #[test]
    fn missing_credentials_is_reported_with_env_var_name() {
        std::env::remove_var("OPENAI_API_KEY");
        let creds = Credentials::default();
        let err = create("openai", &creds).unwrap_err();
        assert_eq!(err.category, Category::MissingCredentials);
        assert!(err.message.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn env_var_takes_precedence_over_credentials_file() {
        std::env::set_var("ANTHROPIC_API_KEY", "env-key");
        let creds = Credentials::default();
        let provider = create("anthropic", &creds).unwrap();
        assert_eq!(provider.name(), "anthropic");
        std::env::remove_var("ANTHROPIC_API_KEY");
    }
}
