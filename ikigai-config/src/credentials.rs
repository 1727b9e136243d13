//! `$HOME/.config/ikigai/credentials.json` — per-provider API keys.
//!
//! Shape: `{ "<provider>": { "api_key": "<string>" }, … }`. Parse failure is a
//! warning, not a hard error: absence of the file, or a malformed file, must
//! not block startup when environment variables already satisfy the request.

use std::collections::HashMap;
use std::path::Path;

const CREDENTIALS_FILE_NAME: &str = "credentials.json";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    keys: HashMap<String, String>,
}

impl Credentials {
    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.keys.get(provider).map(|s| s.as_str())
    }
}

/// Loads `credentials.json` from `dir`. Returns an empty `Credentials` (logging
/// a warning) on any read or parse failure, since this file is optional.
pub fn load_credentials(dir: &Path) -> Credentials {
    let path = dir.join(CREDENTIALS_FILE_NAME);
    let text = match std::fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Credentials::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read credentials file");
            return Credentials::default();
        }
    };

    let raw: serde_json::Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse credentials file");
            return Credentials::default();
        }
    };

    let mut keys = HashMap::new();
    if let Some(obj) = raw.as_object() {
        for (provider, entry) in obj {
            if let Some(api_key) = entry.get("api_key").and_then(|v| v.as_str()) {
                keys.insert(provider.clone(), api_key.to_string());
            }
        }
    }
    Credentials { keys }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_yields_empty_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let creds = load_credentials(dir.path());
        assert_eq!(creds.api_key("openai"), None);
    }

    #[test]
    fn malformed_json_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE_NAME), "{not json").unwrap();
        let creds = load_credentials(dir.path());
        assert_eq!(creds.api_key("openai"), None);
    }

    #[test]
    fn reads_per_provider_api_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CREDENTIALS_FILE_NAME),
            r#"{"openai": {"api_key": "sk-test"}, "anthropic": {"api_key": "ak-test"}}"#,
        )
        .unwrap();
        let creds = load_credentials(dir.path());
        assert_eq!(creds.api_key("openai"), Some("sk-test"));
        assert_eq!(creds.api_key("anthropic"), Some("ak-test"));
        assert_eq!(creds.api_key("google"), None);
    }
}
