//! Provider-agnostic streaming event types (spec §4.12 "Stream events").
//!
//! Every per-provider adapter translates its own SSE framing into this union;
//! the agent/REPL event loop and the HTTP engine only ever see `StreamEvent`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
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

impl ErrorCategory {
    /// Retryable categories are transient (spec §7); the others require user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit
                | ErrorCategory::Server
                | ErrorCategory::Timeout
                | ErrorCategory::Network
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt: u32,
    pub completion: u32,
    pub thinking: u32,
}

/// One provider-agnostic streaming event (spec §4.12).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ContentDelta {
        text: String,
    },
    ToolCallStart {
        index: usize,
        id: String,
        name: String,
    },
    ToolCallDelta {
        index: usize,
        argument_fragment: String,
    },
    ToolCallDone {
        index: usize,
    },
    /// A Gemini 3 opaque thought-signature carried on an assistant turn, to be
    /// forwarded verbatim on the next request.
    ThoughtSignature {
        signature: String,
    },
    Error {
        category: ErrorCategory,
        message: String,
        retryable: bool,
        retry_after_ms: Option<u64>,
    },
    Finish {
        reason: FinishReason,
        usage: Usage,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_categories() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Server.is_retryable());
        assert!(ErrorCategory::Timeout.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Auth.is_retryable());
        assert!(!ErrorCategory::InvalidArg.is_retryable());
    }

    #[test]
    fn stream_event_serializes_with_tag() {
        let ev = StreamEvent::ContentDelta {
            text: "hi".to_string(),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "content_delta");
        assert_eq!(v["text"], "hi");
    }
}
