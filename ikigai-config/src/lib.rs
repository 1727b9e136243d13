//! Loads and validates ikigai's JSON config and credentials from `$HOME/.config/ikigai`.
//!
//! Two files, loaded independently: `config.json` (required fields, typed and
//! range-validated, auto-created with defaults on first run) and
//! `credentials.json` (optional, non-fatal on parse failure).

mod credentials;
mod paths;

pub use credentials::{load_credentials, Credentials};
pub use paths::{expand_tilde, ikigai_config_dir};

use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_HISTORY_SIZE: i64 = 10_000;
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("value out of range: {0}")]
    OutOfRange(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Validated, fully-populated application configuration (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub openai_model: String,
    pub openai_temperature: f64,
    pub openai_max_completion_tokens: i64,
    pub openai_system_message: Option<String>,
    pub listen_address: String,
    pub listen_port: i64,
    pub max_tool_turns: i64,
    pub max_output_size: i64,
    pub history_size: i64,
    /// Relational store path (spec §4.16 "if a DB connection string is
    /// configured"); `None` runs with no session persistence or `/fork`
    /// history. Tilde-prefixed paths expand via `HOME` (spec §6).
    pub db_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            openai_model: "gpt-5".to_string(),
            openai_temperature: 1.0,
            openai_max_completion_tokens: 4096,
            openai_system_message: None,
            listen_address: "127.0.0.1".to_string(),
            listen_port: 8787,
            max_tool_turns: 25,
            max_output_size: 1_048_576,
            history_size: DEFAULT_HISTORY_SIZE,
            db_path: Some("~/.config/ikigai/ikigai.db".to_string()),
        }
    }
}

/// Loads `config.json` from `dir`, creating it with defaults if absent, then validates it.
pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        std::fs::create_dir_all(dir)?;
        let defaults = default_config_json();
        std::fs::write(&path, serde_json::to_string_pretty(&defaults).unwrap())?;
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(&path)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
    parse_and_validate(&value)
}

fn default_config_json() -> Value {
    let c = Config::default();
    serde_json::json!({
        "openai_model": c.openai_model,
        "openai_temperature": c.openai_temperature,
        "openai_max_completion_tokens": c.openai_max_completion_tokens,
        "openai_system_message": c.openai_system_message,
        "listen_address": c.listen_address,
        "listen_port": c.listen_port,
        "max_tool_turns": c.max_tool_turns,
        "max_output_size": c.max_output_size,
        "history_size": c.history_size,
        "db_path": c.db_path,
    })
}

fn req_string(v: &Value, field: &str) -> Result<String, ConfigError> {
    v.get(field)
        .ok_or_else(|| ConfigError::Parse(format!("missing field `{}`", field)))?
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ConfigError::Parse(format!("field `{}` must be a string", field)))
}

fn req_number(v: &Value, field: &str) -> Result<f64, ConfigError> {
    v.get(field)
        .ok_or_else(|| ConfigError::Parse(format!("missing field `{}`", field)))?
        .as_f64()
        .ok_or_else(|| ConfigError::Parse(format!("field `{}` must be a number", field)))
}

fn req_integer(v: &Value, field: &str) -> Result<i64, ConfigError> {
    v.get(field)
        .ok_or_else(|| ConfigError::Parse(format!("missing field `{}`", field)))?
        .as_i64()
        .ok_or_else(|| ConfigError::Parse(format!("field `{}` must be an integer", field)))
}

fn opt_nullable_string(v: &Value, field: &str) -> Result<Option<String>, ConfigError> {
    match v.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigError::Parse(format!(
            "field `{}` must be a string or null",
            field
        ))),
    }
}

fn parse_and_validate(v: &Value) -> Result<Config, ConfigError> {
    let openai_model = req_string(v, "openai_model")?;
    let openai_temperature = req_number(v, "openai_temperature")?;
    let openai_max_completion_tokens = req_integer(v, "openai_max_completion_tokens")?;
    let openai_system_message = opt_nullable_string(v, "openai_system_message")?;
    let listen_address = req_string(v, "listen_address")?;
    let listen_port = req_integer(v, "listen_port")?;
    let max_tool_turns = req_integer(v, "max_tool_turns")?;
    let max_output_size = req_integer(v, "max_output_size")?;
    let history_size = match v.get("history_size") {
        None => DEFAULT_HISTORY_SIZE,
        Some(_) => req_integer(v, "history_size")?,
    };
    let db_path = opt_nullable_string(v, "db_path")?;

    if !(1024..=65535).contains(&listen_port) {
        return Err(ConfigError::OutOfRange(format!(
            "listen_port must be in [1024, 65535], got {}",
            listen_port
        )));
    }
    if !(1..=1000).contains(&max_tool_turns) {
        return Err(ConfigError::OutOfRange(format!(
            "max_tool_turns must be in [1, 1000], got {}",
            max_tool_turns
        )));
    }
    if !(1024..=104_857_600).contains(&max_output_size) {
        return Err(ConfigError::OutOfRange(format!(
            "max_output_size must be in [1024, 104857600], got {}",
            max_output_size
        )));
    }
    if history_size <= 0 || history_size > i32::MAX as i64 {
        return Err(ConfigError::OutOfRange(format!(
            "history_size must be > 0 and <= INT32_MAX, got {}",
            history_size
        )));
    }

    Ok(Config {
        openai_model,
        openai_temperature,
        openai_max_completion_tokens,
        openai_system_message,
        listen_address,
        listen_port,
        max_tool_turns,
        max_output_size,
        history_size,
        db_path,
    })
}

/// Loads config from the default `$HOME/.config/ikigai` directory.
pub fn load_default_config() -> Result<Config, ConfigError> {
    let dir = ikigai_config_dir()?;
    load_config(&dir)
}

pub fn default_config_dir_for(home: &str) -> PathBuf {
    Path::new(home).join(".config").join("ikigai")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn missing_field_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{"openai_model":"x"}"#).unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = default_config_json();
        v["listen_port"] = Value::String("not-a-number".into());
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), v.to_string()).unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn out_of_range_port_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = default_config_json();
        v["listen_port"] = Value::from(80);
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), v.to_string()).unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange(_)));
    }

    #[test]
    fn out_of_range_max_tool_turns_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = default_config_json();
        v["max_tool_turns"] = Value::from(0);
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), v.to_string()).unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange(_)));
    }

    #[test]
    fn nullable_system_message_accepts_null() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = default_config_json();
        v["openai_system_message"] = Value::Null;
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), v.to_string()).unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.openai_system_message, None);
    }

    #[test]
    fn db_path_null_disables_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = default_config_json();
        v["db_path"] = Value::Null;
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), v.to_string()).unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.db_path, None);
    }

    #[test]
    fn db_path_absent_is_treated_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = default_config_json();
        v.as_object_mut().unwrap().remove("db_path");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), v.to_string()).unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.db_path, None);
    }

    #[test]
    fn history_size_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = default_config_json();
        v.as_object_mut().unwrap().remove("history_size");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), v.to_string()).unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg.history_size, DEFAULT_HISTORY_SIZE);
    }
}
