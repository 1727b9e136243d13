//! Anthropic Messages adapter (spec §4.12 "Anthropic").
//!
//! Grounded in `austinjan-km/km-tools/src/llm/anthropic.rs`'s request shape;
//! the `event:`-tagged SSE framing (`content_block_start/_delta/_stop`) is
//! this spec's own addition since that pack's adapter does not model it.

use ikigai_stream_event::{ErrorCategory, FinishReason, StreamEvent, Usage};
use serde::Serialize;
use serde_json::json;

use super::{ModelCaps, Provider};
use crate::error::Error;
use crate::request::{ContentBlock, Request, Role};

const BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        AnthropicProvider { api_key }
    }
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
}

fn to_messages(req: &Request) -> Vec<AnthropicMessage> {
    let mut out = Vec::new();
    for m in &req.messages {
        match m.role {
            Role::System => continue,
            Role::Tool => {
                let blocks: Vec<AnthropicBlock> = m
                    .content_blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolResult { tool_call_id, output_text, is_error } => {
                            Some(AnthropicBlock::ToolResult {
                                tool_use_id: tool_call_id.clone(),
                                content: output_text.clone(),
                                is_error: *is_error,
                            })
                        }
                        _ => None,
                    })
                    .collect();
                out.push(AnthropicMessage { role: "user", content: blocks });
            }
            Role::User => out.push(AnthropicMessage {
                role: "user",
                content: vec![AnthropicBlock::Text { text: m.text_content() }],
            }),
            Role::Assistant => {
                let mut blocks = Vec::new();
                for b in &m.content_blocks {
                    match b {
                        ContentBlock::Text { text } => blocks.push(AnthropicBlock::Text { text: text.clone() }),
                        ContentBlock::ToolCall { id, name, arguments_json, .. } => {
                            let input = serde_json::from_str(arguments_json).unwrap_or(serde_json::Value::Null);
                            blocks.push(AnthropicBlock::ToolUse {
                                id: id.clone(),
                                name: name.clone(),
                                input,
                            });
                        }
                        ContentBlock::ToolResult { .. } => {}
                    }
                }
                out.push(AnthropicMessage { role: "assistant", content: blocks });
            }
        }
    }
    out
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn serialize_request(&self, req: &Request) -> Result<String, Error> {
        let messages = to_messages(req);
        let mut body = json!({
            "model": req.model,
            "messages": messages,
            "stream": true,
            "max_tokens": req.max_output_tokens.unwrap_or(4096),
        });
        if let Some(sys) = &req.system_prompt {
            body["system"] = json!(sys);
        }
        if !req.tools.is_empty() {
            let tools: Result<Vec<_>, Error> = req
                .tools
                .iter()
                .map(|t| -> Result<_, Error> {
                    let schema: serde_json::Value = serde_json::from_str(&t.parameters_schema_json)?;
                    Ok(json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": schema,
                    }))
                })
                .collect();
            body["tools"] = json!(tools?);
        }
        Ok(body.to_string())
    }

    fn build_url(&self, _model: &str, _api_key: &str, _streaming: bool) -> String {
        format!("{}/messages", BASE_URL)
    }

    fn build_headers(&self, _streaming: bool, _api_key: &str) -> Vec<(String, String)> {
        vec![
            ("x-api-key".to_string(), self.api_key.clone()),
            ("anthropic-version".to_string(), ANTHROPIC_VERSION.to_string()),
            ("content-type".to_string(), "application/json".to_string()),
        ]
    }

    fn parse_sse_event(&self, event_name: Option<&str>, data: &str) -> Vec<StreamEvent> {
        let event_name = match event_name {
            Some(n) => n,
            None => return vec![],
        };
        let v: serde_json::Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                return vec![StreamEvent::Error {
                    category: ErrorCategory::Parse,
                    message: format!("anthropic SSE parse error: {}", e),
                    retryable: false,
                    retry_after_ms: None,
                }]
            }
        };
        match event_name {
            "content_block_delta" => {
                let delta = &v["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => {
                        if let Some(text) = delta["text"].as_str() {
                            return vec![StreamEvent::ContentDelta { text: text.to_string() }];
                        }
                    }
                    Some("input_json_delta") => {
                        if let Some(partial) = delta["partial_json"].as_str() {
                            let index = v["index"].as_u64().unwrap_or(0) as usize;
                            return vec![StreamEvent::ToolCallDelta {
                                index,
                                argument_fragment: partial.to_string(),
                            }];
                        }
                    }
                    _ => {}
                }
                vec![]
            }
            "content_block_start" => {
                let block = &v["content_block"];
                if block["type"].as_str() == Some("tool_use") {
                    let index = v["index"].as_u64().unwrap_or(0) as usize;
                    return vec![StreamEvent::ToolCallStart {
                        index,
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                    }];
                }
                vec![]
            }
            "content_block_stop" => {
                let index = v["index"].as_u64().unwrap_or(0) as usize;
                vec![StreamEvent::ToolCallDone { index }]
            }
            "message_delta" => {
                let stop_reason = v["delta"]["stop_reason"].as_str();
                let usage = Usage {
                    prompt: v["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
                    completion: v["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
                    thinking: 0,
                };
                let reason = match stop_reason {
                    Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
                    Some("max_tokens") => FinishReason::Length,
                    Some("tool_use") => FinishReason::ToolCalls,
                    _ => return vec![],
                };
                vec![StreamEvent::Finish { reason, usage }]
            }
            "error" => {
                let message = v["error"]["message"].as_str().unwrap_or("unknown error").to_string();
                vec![StreamEvent::Error {
                    category: ErrorCategory::Server,
                    message,
                    retryable: true,
                    retry_after_ms: None,
                }]
            }
            _ => vec![],
        }
    }

    fn handle_error(&self, status: u16, body: &str) -> (ErrorCategory, String, bool, Option<u64>) {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.to_string());
        let category = match status {
            401 => ErrorCategory::Auth,
            429 => ErrorCategory::RateLimit,
            529 => ErrorCategory::Server,
            s if s >= 500 => ErrorCategory::Server,
            _ => ErrorCategory::Internal,
        };
        (category, message, category.is_retryable(), None)
    }

    fn model_caps(&self, _model: &str) -> ModelCaps {
        ModelCaps { supports_thinking: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_system_prompt_at_top_level() {
        let provider = AnthropicProvider::new("ak-test".to_string());
        let req = Request {
            model: "claude-sonnet-4-5".to_string(),
            system_prompt: Some("be terse".to_string()),
            messages: vec![crate::request::Message::text(Role::User, "hi")],
            tools: vec![],
            tool_choice: crate::request::ToolChoice::Auto,
            max_output_tokens: Some(1024),
            thinking: ikigai_model_spec::ThinkingLevel::Med,
        };
        let body = provider.serialize_request(&req).unwrap();
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["system"], "be terse");
        assert_eq!(v["messages"][0]["role"], "user");
    }

    #[test]
    fn text_delta_event() {
        let provider = AnthropicProvider::new("ak-test".to_string());
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#;
        let events = provider.parse_sse_event(Some("content_block_delta"), data);
        assert_eq!(events, vec![StreamEvent::ContentDelta { text: "hi".to_string() }]);
    }

    #[test]
    fn tool_use_start_event() {
        let provider = AnthropicProvider::new("ak-test".to_string());
        let data = r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"t1","name":"search"}}"#;
        let events = provider.parse_sse_event(Some("content_block_start"), data);
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallStart { index: 0, id: "t1".to_string(), name: "search".to_string() }]
        );
    }

    #[test]
    fn status_529_overloaded_is_server_retryable() {
        let provider = AnthropicProvider::new("ak-test".to_string());
        let (cat, _, retryable, _) = provider.handle_error(529, r#"{"type":"error","error":{"message":"overloaded"}}"#);
        assert_eq!(cat, ErrorCategory::Server);
        assert!(retryable);
    }

    #[test]
    fn status_401_is_auth() {
        let provider = AnthropicProvider::new("ak-test".to_string());
        let (cat, _, _, _) = provider.handle_error(401, r#"{"type":"error","error":{"message":"bad key"}}"#);
        assert_eq!(cat, ErrorCategory::Auth);
    }
}
