//! Per-provider adapters and the capability interface they implement (spec
//! §4.11–§4.12).
//!
//! `ik_provider_t`'s struct of function pointers becomes a plain trait;
//! provider selection stays a small static registry
//! ([`registry::create`]/[`registry::is_valid`]/[`registry::list`]).
//! Grounded in `austinjan-km/km-tools/src/llm/{openai,anthropic,gemini}.rs`'s
//! `reqwest` + `eventsource-stream` shape, generalized to this spec's
//! provider-agnostic `StreamEvent` union instead of that pack's own chunk type.

mod anthropic;
mod google;
mod openai;
mod registry;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use openai::OpenAIProvider;
pub use registry::{create, is_valid, list};

use ikigai_stream_event::ErrorCategory;

use crate::request::Request;

/// One capability each per-provider adapter exposes for thinking-level mapping
/// (spec §4.12 `model_caps`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelCaps {
    pub supports_thinking: bool,
}

/// Capability interface every provider adapter implements (spec §4.12).
/// Synchronous: serialization, URL/header construction, and SSE-frame
/// parsing are pure functions; only the actual request is async (owned by
/// [`crate::http_engine`]).
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    fn serialize_request(&self, req: &Request) -> Result<String, crate::error::Error>;

    fn build_url(&self, model: &str, api_key: &str, streaming: bool) -> String;

    /// Header name/value pairs to attach to the HTTP request.
    fn build_headers(&self, streaming: bool, api_key: &str) -> Vec<(String, String)>;

    /// Parses one already-framed SSE event (the `data:`/`event:` payload,
    /// stripped of framing) into zero or more provider-agnostic stream events.
    fn parse_sse_event(&self, event_name: Option<&str>, data: &str) -> Vec<ikigai_stream_event::StreamEvent>;

    /// Maps an HTTP status and response body to an error category (spec §4.12
    /// per-provider status tables).
    fn handle_error(&self, status: u16, body: &str) -> (ErrorCategory, String, bool, Option<u64>);

    fn model_caps(&self, model: &str) -> ModelCaps {
        let _ = model;
        ModelCaps::default()
    }
}
