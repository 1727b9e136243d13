//! `$HOME` resolution and tilde expansion (spec §6: config/credentials are rooted
//! at `$HOME/.config/ikigai`, not strict XDG base dirs).

use crate::ConfigError;
use std::path::PathBuf;

/// Returns `$HOME/.config/ikigai`, failing with `InvalidArg` if `HOME` is unset.
pub fn ikigai_config_dir() -> Result<PathBuf, ConfigError> {
    let home = home_dir()?;
    Ok(home.join(".config").join("ikigai"))
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(h) = std::env::var("HOME") {
        if !h.is_empty() {
            return Ok(PathBuf::from(h));
        }
    }
    dirs::home_dir().ok_or_else(|| ConfigError::InvalidArg("HOME is not set".to_string()))
}

/// Expands a leading `~` or `~/` to `$HOME`. Fails with `InvalidArg` if the path
/// starts with `~` and `HOME` is unset.
pub fn expand_tilde(path: &str) -> Result<PathBuf, ConfigError> {
    if let Some(rest) = path.strip_prefix("~/") {
        return Ok(home_dir()?.join(rest));
    }
    if path == "~" {
        return home_dir();
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_leading_tilde_slash() {
        std::env::set_var("HOME", "/home/tester");
        let p = expand_tilde("~/notes.txt").unwrap();
        assert_eq!(p, PathBuf::from("/home/tester/notes.txt"));
    }

    #[test]
    fn bare_tilde_is_home() {
        std::env::set_var("HOME", "/home/tester");
        let p = expand_tilde("~").unwrap();
        assert_eq!(p, PathBuf::from("/home/tester"));
    }

    #[test]
    fn non_tilde_path_unchanged() {
        let p = expand_tilde("/var/log/ikigai").unwrap();
        assert_eq!(p, PathBuf::from("/var/log/ikigai"));
    }
}
