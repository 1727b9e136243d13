//! OpenAI Chat Completions adapter (spec §4.12 "OpenAI").
//!
//! Grounded in `austinjan-km/km-tools/src/llm/openai.rs`'s request/response
//! shapes, generalized to emit [`ikigai_stream_event::StreamEvent`] instead of
//! that crate's own `StreamChunk`.

use ikigai_stream_event::{ErrorCategory, FinishReason, StreamEvent, Usage};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ModelCaps, Provider};
use crate::error::Error;
use crate::request::{ContentBlock, Request, Role, ToolChoice};

const BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIProvider {
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        OpenAIProvider { api_key }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCallOut>>,
}

#[derive(Debug, Serialize)]
struct ToolCallOut {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: FunctionOut,
}

#[derive(Debug, Serialize)]
struct FunctionOut {
    name: String,
    arguments: String,
}

fn role_str(r: Role) -> &'static str {
    match r {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn to_chat_messages(req: &Request) -> Vec<ChatMessage> {
    let mut out = Vec::new();
    if let Some(sys) = &req.system_prompt {
        out.push(ChatMessage {
            role: "system",
            content: Some(sys.clone()),
            tool_call_id: None,
            tool_calls: None,
        });
    }
    for m in &req.messages {
        match m.role {
            Role::Tool => {
                for b in &m.content_blocks {
                    if let ContentBlock::ToolResult {
                        tool_call_id,
                        output_text,
                        ..
                    } = b
                    {
                        out.push(ChatMessage {
                            role: "tool",
                            content: Some(output_text.clone()),
                            tool_call_id: Some(tool_call_id.clone()),
                            tool_calls: None,
                        });
                    }
                }
            }
            Role::Assistant => {
                let text = m.text_content();
                let tool_calls: Vec<ToolCallOut> = m
                    .content_blocks
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::ToolCall { id, name, arguments_json, .. } => Some(ToolCallOut {
                            id: id.clone(),
                            kind: "function",
                            function: FunctionOut {
                                name: name.clone(),
                                arguments: arguments_json.clone(),
                            },
                        }),
                        _ => None,
                    })
                    .collect();
                out.push(ChatMessage {
                    role: "assistant",
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_call_id: None,
                    tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                });
            }
            other => {
                out.push(ChatMessage {
                    role: role_str(other),
                    content: Some(m.text_content()),
                    tool_call_id: None,
                    tool_calls: None,
                });
            }
        }
    }
    out
}

impl Provider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn serialize_request(&self, req: &Request) -> Result<String, Error> {
        let messages = to_chat_messages(req);
        let mut body = json!({
            "model": req.model,
            "messages": messages,
            "stream": true,
        });
        if let Some(max) = req.max_output_tokens {
            body["max_completion_tokens"] = json!(max);
        }
        if !req.tools.is_empty() {
            let tools: Result<Vec<_>, _> = req
                .tools
                .iter()
                .map(|t| -> Result<_, Error> {
                    let params: serde_json::Value = serde_json::from_str(&t.parameters_schema_json)?;
                    Ok(json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": params,
                        }
                    }))
                })
                .collect();
            body["tools"] = json!(tools?);
            body["tool_choice"] = match req.tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::None => json!("none"),
                ToolChoice::Required => json!("required"),
            };
        }
        Ok(body.to_string())
    }

    fn build_url(&self, _model: &str, _api_key: &str, _streaming: bool) -> String {
        format!("{}/chat/completions", BASE_URL)
    }

    fn build_headers(&self, _streaming: bool, _api_key: &str) -> Vec<(String, String)> {
        vec![
            ("Authorization".to_string(), format!("Bearer {}", self.api_key)),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }

    fn parse_sse_event(&self, _event_name: Option<&str>, data: &str) -> Vec<StreamEvent> {
        if data.trim() == "[DONE]" {
            return vec![];
        }
        let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(e) => {
                return vec![StreamEvent::Error {
                    category: ErrorCategory::Parse,
                    message: format!("openai SSE parse error: {}", e),
                    retryable: false,
                    retry_after_ms: None,
                }]
            }
        };
        let mut events = Vec::new();
        if let Some(usage) = chunk.usage {
            events.push(StreamEvent::Finish {
                reason: FinishReason::Stop,
                usage: Usage {
                    prompt: usage.prompt_tokens,
                    completion: usage.completion_tokens,
                    thinking: 0,
                },
            });
            return events;
        }
        for choice in &chunk.choices {
            if let Some(text) = &choice.delta.content {
                events.push(StreamEvent::ContentDelta { text: text.clone() });
            }
            if let Some(tool_calls) = &choice.delta.tool_calls {
                for tc in tool_calls {
                    if let Some(id) = &tc.id {
                        events.push(StreamEvent::ToolCallStart {
                            index: tc.index,
                            id: id.clone(),
                            name: tc.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default(),
                        });
                    }
                    if let Some(f) = &tc.function {
                        if let Some(args) = &f.arguments {
                            events.push(StreamEvent::ToolCallDelta {
                                index: tc.index,
                                argument_fragment: args.clone(),
                            });
                        }
                    }
                }
            }
            if let Some(reason) = &choice.finish_reason {
                let reason = match reason.as_str() {
                    "stop" => FinishReason::Stop,
                    "length" => FinishReason::Length,
                    "content_filter" => FinishReason::ContentFilter,
                    "tool_calls" => {
                        if let Some(tool_calls) = &choice.delta.tool_calls {
                            for tc in tool_calls {
                                events.push(StreamEvent::ToolCallDone { index: tc.index });
                            }
                        }
                        FinishReason::ToolCalls
                    }
                    _ => FinishReason::Stop,
                };
                events.push(StreamEvent::Finish {
                    reason,
                    usage: Usage::default(),
                });
            }
        }
        events
    }

    fn handle_error(&self, status: u16, body: &str) -> (ErrorCategory, String, bool, Option<u64>) {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
            .unwrap_or_else(|| body.to_string());
        let code = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error")?.get("code")?.as_str().map(str::to_string));

        let category = match status {
            401 => ErrorCategory::Auth,
            429 => ErrorCategory::RateLimit,
            400 if code.as_deref() == Some("context_length_exceeded") => ErrorCategory::InvalidArg,
            s if s >= 500 => ErrorCategory::Server,
            _ => ErrorCategory::Internal,
        };
        (category, message, category.is_retryable(), None)
    }

    fn model_caps(&self, model: &str) -> ModelCaps {
        ModelCaps {
            supports_thinking: model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{BuildOptions, ConversationSource};
    use ikigai_model_spec::ThinkingLevel;

    struct Fake {
        messages: Vec<crate::request::Message>,
    }
    impl ConversationSource for Fake {
        fn model(&self) -> &str {
            "gpt-5"
        }
        fn messages(&self) -> &[crate::request::Message] {
            &self.messages
        }
        fn thinking(&self) -> ThinkingLevel {
            ThinkingLevel::Med
        }
    }

    #[test]
    fn serializes_user_message() {
        let provider = OpenAIProvider::new("sk-test".to_string());
        let agent = Fake {
            messages: vec![crate::request::Message::text(Role::User, "hi")],
        };
        let req = crate::request::build_from_conversation(&agent, &BuildOptions::default()).unwrap();
        let body = provider.serialize_request(&req).unwrap();
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "hi");
        assert_eq!(v["stream"], true);
    }

    #[test]
    fn parses_content_delta() {
        let provider = OpenAIProvider::new("sk-test".to_string());
        let data = r#"{"choices":[{"delta":{"content":"hi"},"finish_reason":null}]}"#;
        let events = provider.parse_sse_event(None, data);
        assert_eq!(events, vec![StreamEvent::ContentDelta { text: "hi".to_string() }]);
    }

    #[test]
    fn done_marker_yields_no_events() {
        let provider = OpenAIProvider::new("sk-test".to_string());
        assert!(provider.parse_sse_event(None, "[DONE]").is_empty());
    }

    #[test]
    fn status_401_is_auth() {
        let provider = OpenAIProvider::new("sk-test".to_string());
        let (cat, _, retryable, _) = provider.handle_error(401, r#"{"error":{"message":"bad key"}}"#);
        assert_eq!(cat, ErrorCategory::Auth);
        assert!(!retryable);
    }

    #[test]
    fn status_429_is_rate_limit_and_retryable() {
        let provider = OpenAIProvider::new("sk-test".to_string());
        let (cat, _, retryable, _) = provider.handle_error(429, r#"{"error":{"message":"slow down"}}"#);
        assert_eq!(cat, ErrorCategory::RateLimit);
        assert!(retryable);
    }

    #[test]
    fn context_length_exceeded_is_invalid_arg() {
        let provider = OpenAIProvider::new("sk-test".to_string());
        let (cat, _, _, _) = provider.handle_error(
            400,
            r#"{"error":{"message":"too long","code":"context_length_exceeded"}}"#,
        );
        assert_eq!(cat, ErrorCategory::InvalidArg);
    }

    #[test]
    fn server_error_is_retryable() {
        let provider = OpenAIProvider::new("sk-test".to_string());
        let (cat, _, retryable, _) = provider.handle_error(503, "oops");
        assert_eq!(cat, ErrorCategory::Server);
        assert!(retryable);
    }
}
