//! Google Gemini adapter (spec §4.12 "Google (Gemini)").
//!
//! Request shape grounded in `austinjan-km/km-tools/src/llm/gemini.rs`; the
//! 2.5-vs-3 thinking-config split and `additionalProperties` stripping are
//! this spec's own requirements, layered on `ikigai-model-spec`'s budget math.

use ikigai_stream_event::{ErrorCategory, FinishReason, StreamEvent, Usage};
use serde_json::{json, Value};

use super::{ModelCaps, Provider};
use crate::error::Error;
use crate::request::{ContentBlock, Request, Role};
use ikigai_model_spec::{thinking_budget, thinking_level_str};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleProvider {
    api_key: String,
}

impl GoogleProvider {
    pub fn new(api_key: String) -> Self {
        GoogleProvider { api_key }
    }
}

fn is_gemini_3(model: &str) -> bool {
    model.contains("gemini-3")
}

fn is_gemini_25(model: &str) -> bool {
    model.contains("gemini-2.5")
}

/// Recursively strips `additionalProperties` from a JSON schema (Gemini rejects it).
fn strip_additional_properties(v: &mut Value) {
    match v {
        Value::Object(map) => {
            map.remove("additionalProperties");
            for (_, child) in map.iter_mut() {
                strip_additional_properties(child);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strip_additional_properties(item);
            }
        }
        _ => {}
    }
}

fn to_contents(req: &Request) -> Vec<Value> {
    let mut out = Vec::new();
    for m in &req.messages {
        match m.role {
            Role::System => continue,
            Role::User => out.push(json!({
                "role": "user",
                "parts": [{"text": m.text_content()}],
            })),
            Role::Tool => {
                let parts: Vec<Value> = m
                    .content_blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolResult { output_text, .. } => Some(json!({
                            "functionResponse": {
                                "name": "",
                                "response": {"result": output_text},
                            }
                        })),
                        _ => None,
                    })
                    .collect();
                out.push(json!({"role": "user", "parts": parts}));
            }
            Role::Assistant => {
                let mut parts = Vec::new();
                for b in &m.content_blocks {
                    match b {
                        ContentBlock::Text { text } => parts.push(json!({"text": text})),
                        ContentBlock::ToolCall { name, arguments_json, .. } => {
                            let args: Value = serde_json::from_str(arguments_json).unwrap_or(Value::Null);
                            parts.push(json!({"functionCall": {"name": name, "args": args}}));
                        }
                        ContentBlock::ToolResult { .. } => {}
                    }
                }
                out.push(json!({"role": "model", "parts": parts}));
            }
        }
    }
    out
}

impl Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn serialize_request(&self, req: &Request) -> Result<String, Error> {
        let mut body = json!({
            "contents": to_contents(req),
        });
        if let Some(sys) = &req.system_prompt {
            body["systemInstruction"] = json!({"parts": [{"text": sys}]});
        }
        if let Some(max) = req.max_output_tokens {
            body["generationConfig"] = json!({"maxOutputTokens": max});
        }
        if !req.tools.is_empty() {
            let decls: Result<Vec<Value>, Error> = req
                .tools
                .iter()
                .map(|t| -> Result<Value, Error> {
                    let mut schema: Value = serde_json::from_str(&t.parameters_schema_json)?;
                    strip_additional_properties(&mut schema);
                    Ok(json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": schema,
                    }))
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": decls?}]);
            let mode = match req.tool_choice {
                crate::request::ToolChoice::Auto => "AUTO",
                crate::request::ToolChoice::None => "NONE",
                crate::request::ToolChoice::Required => "ANY",
            };
            body["toolConfig"] = json!({"functionCallingConfig": {"mode": mode}});
        }

        if is_gemini_3(&req.model) {
            let level = thinking_level_str(req.thinking);
            body["generationConfig"]["thinkingConfig"] = json!({"thinkingLevel": level});
        } else if is_gemini_25(&req.model) {
            let budget = thinking_budget(&req.model, req.thinking)?;
            body["generationConfig"]["thinkingConfig"] = json!({"thinkingBudget": budget});
        }

        Ok(body.to_string())
    }

    fn build_url(&self, model: &str, api_key: &str, streaming: bool) -> String {
        let method = if streaming { "streamGenerateContent" } else { "generateContent" };
        let suffix = if streaming { "&alt=sse" } else { "" };
        format!("{}/models/{}:{}?key={}{}", BASE_URL, model, method, api_key, suffix)
    }

    fn build_headers(&self, _streaming: bool, _api_key: &str) -> Vec<(String, String)> {
        vec![("content-type".to_string(), "application/json".to_string())]
    }

    fn parse_sse_event(&self, _event_name: Option<&str>, data: &str) -> Vec<StreamEvent> {
        let v: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                return vec![StreamEvent::Error {
                    category: ErrorCategory::Parse,
                    message: format!("gemini SSE parse error: {}", e),
                    retryable: false,
                    retry_after_ms: None,
                }]
            }
        };
        let mut events = Vec::new();
        let candidate = &v["candidates"][0];
        if let Some(signature) = candidate["content"]["parts"]
            .as_array()
            .and_then(|parts| parts.iter().find_map(|p| p["thoughtSignature"].as_str()))
        {
            events.push(StreamEvent::ThoughtSignature { signature: signature.to_string() });
        }
        if let Some(parts) = candidate["content"]["parts"].as_array() {
            for (i, part) in parts.iter().enumerate() {
                if let Some(text) = part["text"].as_str() {
                    events.push(StreamEvent::ContentDelta { text: text.to_string() });
                }
                if let Some(call) = part.get("functionCall") {
                    let name = call["name"].as_str().unwrap_or_default().to_string();
                    let args = call["args"].to_string();
                    events.push(StreamEvent::ToolCallStart { index: i, id: name.clone(), name });
                    events.push(StreamEvent::ToolCallDelta { index: i, argument_fragment: args });
                    events.push(StreamEvent::ToolCallDone { index: i });
                }
            }
        }
        if let Some(reason) = candidate["finishReason"].as_str() {
            let usage = &v["usageMetadata"];
            let finish_reason = match reason {
                "STOP" => FinishReason::Stop,
                "MAX_TOKENS" => FinishReason::Length,
                "SAFETY" | "RECITATION" => FinishReason::ContentFilter,
                _ => FinishReason::Stop,
            };
            events.push(StreamEvent::Finish {
                reason: finish_reason,
                usage: Usage {
                    prompt: usage["promptTokenCount"].as_u64().unwrap_or(0) as u32,
                    completion: usage["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
                    thinking: usage["thoughtsTokenCount"].as_u64().unwrap_or(0) as u32,
                },
            });
        }
        events
    }

    fn handle_error(&self, status: u16, body: &str) -> (ErrorCategory, String, bool, Option<u64>) {
        let v: Option<Value> = serde_json::from_str(body).ok();
        let message = v
            .as_ref()
            .and_then(|v| v["error"]["message"].as_str())
            .unwrap_or(body)
            .to_string();
        let status_str = v.as_ref().and_then(|v| v["error"]["status"].as_str()).unwrap_or("");
        let retry_after_ms = v
            .as_ref()
            .and_then(|v| v["retryDelay"].as_str())
            .and_then(|s| s.strip_suffix('s'))
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000);

        let category = match status_str {
            "PERMISSION_DENIED" => ErrorCategory::Auth,
            "RESOURCE_EXHAUSTED" => ErrorCategory::RateLimit,
            "INVALID_ARGUMENT" => ErrorCategory::InvalidArg,
            "NOT_FOUND" => ErrorCategory::NotFound,
            "DEADLINE_EXCEEDED" => ErrorCategory::Timeout,
            "INTERNAL" | "UNAVAILABLE" => ErrorCategory::Server,
            _ => match status {
                401 | 403 => ErrorCategory::Auth,
                429 => ErrorCategory::RateLimit,
                404 => ErrorCategory::NotFound,
                s if s >= 500 => ErrorCategory::Server,
                _ => ErrorCategory::Internal,
            },
        };
        (category, message, category.is_retryable(), retry_after_ms)
    }

    fn model_caps(&self, model: &str) -> ModelCaps {
        ModelCaps { supports_thinking: is_gemini_3(model) || is_gemini_25(model) }
    }
}
