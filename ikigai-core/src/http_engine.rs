//! Async HTTP engine driving one streaming request at a time (spec §4.13).
//!
//! The source's `curl_multi` handle polled from a hand-rolled `select()` fd
//! union becomes a `tokio::task` reading a `reqwest` SSE response through
//! `eventsource-stream`, forwarding parsed [`StreamEvent`]s over an
//! unbounded channel the REPL's `tokio::select!` iteration already polls
//! alongside stdin and the debug pipes (spec §9 "async/cooperative event loop
//! translation"). Grounded in `austinjan-km/km-tools/src/llm/openai.rs`'s
//! `bytes_stream().eventsource()` pump.

use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ikigai_stream_event::{ErrorCategory, StreamEvent};

use crate::provider::Provider;
use crate::request::Request;

/// Provider-recommended timeout, capped (spec §5 "Timeouts").
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A single in-flight streaming request. Dropping or calling [`Handle::cancel`]
/// aborts the underlying task; any partial content already sent over the
/// channel is left for the caller to finalize (spec §5 "Cancellation").
pub struct Handle {
    task: JoinHandle<()>,
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
}

impl Handle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

#[derive(Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
}

impl Default for HttpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpEngine {
    pub fn new() -> Self {
        HttpEngine {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Starts one streaming request and returns a handle whose `events`
    /// channel receives parsed [`StreamEvent`]s in arrival order, terminated
    /// by exactly one `Finish` or `Error` event (spec §4.13 `on_complete`).
    pub fn start_request(&self, provider: Arc<dyn Provider>, req: Request, api_key: String) -> Handle {
        let client = self.client.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let body = match provider.serialize_request(&req) {
                Ok(b) => b,
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error {
                        category: ErrorCategory::Internal,
                        message: e.message,
                        retryable: false,
                        retry_after_ms: None,
                    });
                    return;
                }
            };
            let url = provider.build_url(&req.model, &api_key, true);
            let mut builder = client.post(&url).body(body);
            for (k, v) in provider.build_headers(true, &api_key) {
                builder = builder.header(k, v);
            }

            let response = match builder.send().await {
                Ok(r) => r,
                Err(e) => {
                    let category = if e.is_timeout() {
                        ErrorCategory::Timeout
                    } else {
                        ErrorCategory::Network
                    };
                    let _ = tx.send(StreamEvent::Error {
                        category,
                        message: e.to_string(),
                        retryable: category.is_retryable(),
                        retry_after_ms: None,
                    });
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                let (category, message, retryable, retry_after_ms) = provider.handle_error(status, &body);
                let _ = tx.send(StreamEvent::Error {
                    category,
                    message,
                    retryable,
                    retry_after_ms,
                });
                return;
            }

            let mut stream = response.bytes_stream().eventsource();
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            break;
                        }
                        let name = if event.event.is_empty() { None } else { Some(event.event.as_str()) };
                        for parsed in provider.parse_sse_event(name, &event.data) {
                            let is_terminal = matches!(parsed, StreamEvent::Finish { .. } | StreamEvent::Error { .. });
                            let _ = tx.send(parsed);
                            if is_terminal {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(StreamEvent::Error {
                            category: ErrorCategory::Network,
                            message: e.to_string(),
                            retryable: true,
                            retry_after_ms: None,
                        });
                        return;
                    }
                }
            }
        });

        Handle { task, events: rx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_builds_with_default_client() {
        let _engine = HttpEngine::new();
    }
}
