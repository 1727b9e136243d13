//! Tagged-union success/failure with category, source location, and message
//! (spec §3 "Result<T>", §9 "Result vs exceptions").
//!
//! The source's `res_t { bool is_err; union { ok; err_t* }; }` plus
//! `OK`/`ERR`/`TRY`/`CHECK` macros become a plain `Result<T, Error>` here;
//! `#[track_caller]` replaces the macros' manual source-location capture.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    InvalidArg,
    OutOfRange,
    Io,
    Parse,
    DbConnect,
    DbMigrate,
    OutOfMemory,
    MissingCredentials,
    NotFound,
    Internal,
    Auth,
    RateLimit,
    Server,
    Timeout,
    Network,
}

impl Category {
    /// Canonical string used when a constructed error's message is empty.
    pub fn canonical_str(&self) -> &'static str {
        match self {
            Category::InvalidArg => "invalid argument",
            Category::OutOfRange => "out of range",
            Category::Io => "io error",
            Category::Parse => "parse error",
            Category::DbConnect => "database connection error",
            Category::DbMigrate => "database migration error",
            Category::OutOfMemory => "out of memory",
            Category::MissingCredentials => "missing credentials",
            Category::NotFound => "not found",
            Category::Internal => "internal error",
            Category::Auth => "authentication error",
            Category::RateLimit => "rate limited",
            Category::Server => "server error",
            Category::Timeout => "timeout",
            Category::Network => "network error",
        }
    }

    /// Retryable categories are transient (spec §7).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Category::RateLimit | Category::Server | Category::Timeout | Category::Network
        )
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    pub category: Category,
    pub message: String,
    pub source_file: &'static str,
    pub source_line: u32,
}

impl Error {
    #[track_caller]
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Error {
            category,
            message: message.into(),
            source_file: loc.file(),
            source_line: loc.line(),
        }
    }

    /// The category's formatted message, falling back to the canonical string
    /// when the message is empty.
    pub fn error_category(&self) -> &str {
        if self.message.is_empty() {
            self.category.canonical_str()
        } else {
            &self.message
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} at {}:{}]",
            self.error_category(),
            self.category.canonical_str(),
            self.source_file,
            self.source_line
        )
    }
}

impl std::error::Error for Error {}

impl From<ikigai_config::ConfigError> for Error {
    #[track_caller]
    fn from(e: ikigai_config::ConfigError) -> Self {
        let category = match &e {
            ikigai_config::ConfigError::InvalidArg(_) => Category::InvalidArg,
            ikigai_config::ConfigError::Parse(_) => Category::Parse,
            ikigai_config::ConfigError::OutOfRange(_) => Category::OutOfRange,
            ikigai_config::ConfigError::Io(_) => Category::Io,
        };
        Error::new(category, e.to_string())
    }
}

impl From<ikigai_model_spec::ModelSpecError> for Error {
    #[track_caller]
    fn from(e: ikigai_model_spec::ModelSpecError) -> Self {
        match e {
            ikigai_model_spec::ModelSpecError::InvalidArg(m) => Error::new(Category::InvalidArg, m),
        }
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        Error::new(Category::Io, e.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    #[track_caller]
    fn from(e: rusqlite::Error) -> Self {
        Error::new(Category::DbConnect, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    #[track_caller]
    fn from(e: serde_json::Error) -> Self {
        Error::new(Category::Parse, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_falls_back_to_canonical_string() {
        let e = Error::new(Category::NotFound, "");
        assert_eq!(e.error_category(), "not found");
    }

    #[test]
    fn captures_source_location() {
        let e = Error::new(Category::Internal, "boom");
        assert!(e.source_file.ends_with("error.rs"));
        assert!(e.source_line > 0);
    }

    #[test]
    fn retryable_categories() {
        assert!(Category::RateLimit.is_retryable());
        assert!(!Category::Auth.is_retryable());
    }
}
