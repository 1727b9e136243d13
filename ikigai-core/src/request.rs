//! Canonical request/message/content-block model (spec §3, §4.10).
//!
//! Every provider adapter serializes from this shape; nothing upstream of a
//! provider adapter ever constructs provider-specific JSON directly.

use ikigai_model_spec::ThinkingLevel;
use serde::{Deserialize, Serialize};

use crate::error::{Category, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One piece of message content. Content blocks are immutable once attached
/// to a `Message` (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments_json: String,
        /// Opaque Gemini 3 thought signature, forwarded verbatim on the next request.
        #[serde(skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    ToolResult {
        tool_call_id: String,
        output_text: String,
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content_blocks: Vec<ContentBlock>,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Message {
            role,
            content_blocks: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    /// Concatenates the text of every `Text` block, for display/logging.
    pub fn text_content(&self) -> String {
        self.content_blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters_schema_json: String,
}

impl ToolDef {
    /// Validates `parameters_schema_json` parses as JSON and is an object
    /// (spec's `original_source` tests: malformed schemas are rejected at
    /// request-build time, not deferred to the provider).
    pub fn validate(&self) -> Result<()> {
        let v: serde_json::Value = serde_json::from_str(&self.parameters_schema_json)
            .map_err(|e| Error::new(Category::InvalidArg, format!("tool `{}` schema: {}", self.name, e)))?;
        if !v.is_object() {
            return Err(Error::new(
                Category::InvalidArg,
                format!("tool `{}` schema must be a JSON object", self.name),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDef>,
    pub tool_choice: ToolChoice,
    pub max_output_tokens: Option<i64>,
    pub thinking: ThinkingLevel,
}

/// Minimal view of an agent/conversation needed to build a `Request` (spec §4.10).
/// The real `Agent` (spec §3) implements this; tests can use a plain struct.
pub trait ConversationSource {
    fn model(&self) -> &str;
    fn messages(&self) -> &[Message];
    fn thinking(&self) -> ThinkingLevel;
}

/// Config values the builder copies in. Kept separate from `ikigai_config::Config`
/// so this module has no dependency on the config crate's full shape.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub system_prompt: Option<String>,
    pub max_output_tokens: Option<i64>,
    pub tools: Vec<ToolDef>,
}

/// Builds a `Request` from a conversation source (spec §4.10).
///
/// Fails with `InvalidArg` if the model is empty, or if any tool's schema
/// fails to validate (supplemented from `original_source`'s
/// `request_tools_validation_test.c`).
pub fn build_from_conversation(
    agent: &impl ConversationSource,
    opts: &BuildOptions,
) -> Result<Request> {
    if agent.model().is_empty() {
        return Err(Error::new(Category::InvalidArg, "model must not be empty"));
    }
    for tool in &opts.tools {
        tool.validate()?;
    }
    Ok(Request {
        model: agent.model().to_string(),
        system_prompt: opts.system_prompt.clone().filter(|s| !s.is_empty()),
        messages: agent.messages().to_vec(),
        tools: opts.tools.clone(),
        tool_choice: ToolChoice::Auto,
        max_output_tokens: opts.max_output_tokens,
        thinking: agent.thinking(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        model: String,
        messages: Vec<Message>,
        thinking: ThinkingLevel,
    }

    impl ConversationSource for Fake {
        fn model(&self) -> &str {
            &self.model
        }
        fn messages(&self) -> &[Message] {
            &self.messages
        }
        fn thinking(&self) -> ThinkingLevel {
            self.thinking
        }
    }

    #[test]
    fn empty_model_is_invalid_arg() {
        let agent = Fake {
            model: String::new(),
            messages: vec![],
            thinking: ThinkingLevel::Med,
        };
        let err = build_from_conversation(&agent, &BuildOptions::default()).unwrap_err();
        assert_eq!(err.category, Category::InvalidArg);
    }

    #[test]
    fn copies_system_prompt_and_preserves_message_order() {
        let agent = Fake {
            model: "gpt-5".to_string(),
            messages: vec![
                Message::text(Role::User, "hi"),
                Message::text(Role::Assistant, "hello"),
            ],
            thinking: ThinkingLevel::Low,
        };
        let opts = BuildOptions {
            system_prompt: Some("be terse".to_string()),
            max_output_tokens: Some(512),
            tools: vec![],
        };
        let req = build_from_conversation(&agent, &opts).unwrap();
        assert_eq!(req.system_prompt.as_deref(), Some("be terse"));
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::User);
        assert_eq!(req.tool_choice, ToolChoice::Auto);
        assert_eq!(req.max_output_tokens, Some(512));
    }

    #[test]
    fn malformed_tool_schema_rejected_at_build_time() {
        let agent = Fake {
            model: "gpt-5".to_string(),
            messages: vec![],
            thinking: ThinkingLevel::Med,
        };
        let opts = BuildOptions {
            tools: vec![ToolDef {
                name: "broken".to_string(),
                description: "d".to_string(),
                parameters_schema_json: "not json".to_string(),
            }],
            ..Default::default()
        };
        let err = build_from_conversation(&agent, &opts).unwrap_err();
        assert_eq!(err.category, Category::InvalidArg);
    }

    #[test]
    fn empty_system_prompt_is_not_copied() {
        let agent = Fake {
            model: "gpt-5".to_string(),
            messages: vec![],
            thinking: ThinkingLevel::Med,
        };
        let opts = BuildOptions {
            system_prompt: Some(String::new()),
            ..Default::default()
        };
        let req = build_from_conversation(&agent, &opts).unwrap();
        assert_eq!(req.system_prompt, None);
    }
}
