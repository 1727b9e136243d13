//! Conversation/agent state machine: run state, scrollback/buffer/layer-cake
//! ownership, fork, and the tool-worker thread boundary (spec §3 "Conversation
//! / Agent", §4.14, §5).
//!
//! Grounded in `hi-youichi-loom/graphweave/src/state/react_state.rs`'s
//! `ToolCall`/`ToolResult` shape, generalized from ReAct's single-turn fields
//! to this spec's persistent, forkable conversation with its own scrollback
//! and input buffer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ikigai_model_spec::ThinkingLevel;

use crate::completion::Completion;
use crate::error::{Category, Error, Result};
use crate::layer_cake::LayerCake;
use crate::provider::Provider;
use crate::request::{ConversationSource, Message};
use crate::scrollback::Scrollback;
use crate::textbuffer::TextBuffer;

/// spec §3 Agent `run_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    WaitingForLlm,
    ExecutingTool,
}

/// Spinner animation state. The REPL event loop advances `frame` on its
/// ~100ms animation tick (spec §4.14, §5 "Timeouts").
#[derive(Debug, Clone, Copy, Default)]
pub struct Spinner {
    pub visible: bool,
    pub frame: usize,
}

/// Outcome of one tool invocation, handed back across the thread boundary
/// (spec §5 "Thread boundary for tools").
#[derive(Debug, Clone)]
pub struct ToolThreadResult {
    pub tool_call_id: String,
    pub output_text: String,
    pub is_error: bool,
}

#[derive(Default)]
struct ToolThreadShared {
    running: bool,
    complete: bool,
    result: Option<ToolThreadResult>,
}

/// Owns the worker thread running one tool call and the mutex-guarded
/// result tuple it writes back into (spec §5 "one worker thread per pending
/// tool call").
pub struct ToolThreadHandle {
    join: Option<JoinHandle<()>>,
    shared: Arc<Mutex<ToolThreadShared>>,
}

impl ToolThreadHandle {
    /// Spawns `work` on a new OS thread. `work` must not touch scrollback,
    /// the input buffer, or the HTTP engine directly (spec §9 "Thread
    /// boundary for tools").
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce() -> ToolThreadResult + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(ToolThreadShared {
            running: true,
            complete: false,
            result: None,
        }));
        let shared_for_thread = Arc::clone(&shared);
        let join = std::thread::spawn(move || {
            let result = work();
            let mut guard = shared_for_thread.lock().unwrap();
            guard.result = Some(result);
            guard.complete = true;
            guard.running = false;
        });
        ToolThreadHandle {
            join: Some(join),
            shared,
        }
    }

    /// Polls the completion flag under the shared mutex; the spinner's
    /// ~100ms tick is a guaranteed wake (spec §5).
    pub fn is_complete(&self) -> bool {
        self.shared.lock().unwrap().complete
    }

    /// Takes the result and joins the thread. Panics if called before
    /// [`ToolThreadHandle::is_complete`] returns true.
    pub fn take_result(mut self) -> ToolThreadResult {
        let result = self
            .shared
            .lock()
            .unwrap()
            .result
            .take()
            .expect("take_result called before completion");
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
        result
    }

    /// Joins an abandoned thread after cancellation (spec §5 "Cancellation").
    pub fn join_abandoned(mut self) {
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Overrides a `/fork` may apply to the child only (spec §4.14 "Fork semantics").
#[derive(Debug, Clone, Default)]
pub struct ForkOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub thinking: Option<ThinkingLevel>,
}

/// A single conversation context with its own history, scrollback, input
/// buffer, and provider binding (spec §3, GLOSSARY "Agent").
pub struct Agent {
    pub uuid: String,
    pub name: Option<String>,
    pub parent_uuid: Option<String>,
    pub fork_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,

    pub provider_name: String,
    pub model: String,
    pub thinking: ThinkingLevel,

    pub messages: Vec<Message>,
    pub scrollback: Scrollback,
    pub buffer: TextBuffer,
    pub layer_cake: LayerCake,
    pub completion: Option<Completion>,
    pub marks: HashMap<String, usize>,

    pub spinner: Spinner,
    pub run_state: RunState,
    pub tool_turns_this_round: u32,

    provider_instance: Option<Arc<dyn Provider>>,
    pub tool_thread: Option<ToolThreadHandle>,
}

/// 22-char base64url-encoded 128-bit uuid (spec §3 "uuid (22-char base64url)").
pub fn new_agent_uuid() -> String {
    URL_SAFE_NO_PAD.encode(uuid::Uuid::new_v4().as_bytes())
}

impl Agent {
    pub fn new(provider_name: impl Into<String>, model: impl Into<String>, thinking: ThinkingLevel) -> Self {
        Agent {
            uuid: new_agent_uuid(),
            name: None,
            parent_uuid: None,
            fork_message_id: None,
            created_at: Utc::now(),
            provider_name: provider_name.into(),
            model: model.into(),
            thinking,
            messages: Vec::new(),
            scrollback: Scrollback::new(),
            buffer: TextBuffer::new(),
            layer_cake: LayerCake::new(),
            completion: None,
            marks: HashMap::new(),
            spinner: Spinner::default(),
            run_state: RunState::Idle,
            tool_turns_this_round: 0,
            provider_instance: None,
            tool_thread: None,
        }
    }

    /// spec §3 invariant: while waiting on the LLM or a tool, the input is
    /// non-editable and the spinner is visible.
    pub fn input_visible(&self) -> bool {
        self.run_state == RunState::Idle
    }

    pub fn spinner_visible(&self) -> bool {
        self.run_state != RunState::Idle
    }

    pub fn append_message(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Records a named mark at the current last message index (spec §4.15 `/mark`).
    pub fn set_mark(&mut self, name: impl Into<String>) {
        let idx = self.messages.len().saturating_sub(1);
        self.marks.insert(name.into(), idx);
    }

    /// Truncates the conversation to `n` messages from the end (spec §4.15
    /// `/rewind [<n>]`); `None` rewinds one turn (the last two messages: the
    /// most recent assistant reply and the user turn that produced it).
    pub fn rewind(&mut self, n: Option<usize>) {
        let drop_count = n.unwrap_or(2).min(self.messages.len());
        self.messages.truncate(self.messages.len() - drop_count);
    }

    /// Rewinds to just after a named mark (spec §4.8/§4.15 marks).
    pub fn rewind_to_mark(&mut self, name: &str) -> Result<()> {
        let idx = *self
            .marks
            .get(name)
            .ok_or_else(|| Error::new(Category::NotFound, format!("no mark named `{}`", name)))?;
        self.messages.truncate((idx + 1).min(self.messages.len()));
        Ok(())
    }

    /// Creates a child agent inheriting the parent's message prefix up to and
    /// including the current tail, the parent's provider/model/thinking
    /// level unless overridden, and recording `parent_uuid`/`fork_message_id`
    /// (spec §4.14 "Fork semantics"). Cross-provider forks infer the new
    /// provider from the new model name.
    pub fn fork(&self, overrides: ForkOverrides) -> Agent {
        let model = overrides.model.unwrap_or_else(|| self.model.clone());
        let provider_name = overrides.provider.unwrap_or_else(|| {
            if model == self.model {
                self.provider_name.clone()
            } else {
                ikigai_model_spec::infer_provider(&model)
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_else(|| self.provider_name.clone())
            }
        });
        let thinking = overrides.thinking.unwrap_or(self.thinking);

        let mut child = Agent::new(provider_name, model, thinking);
        child.parent_uuid = Some(self.uuid.clone());
        child.fork_message_id = Some(self.messages.len().saturating_sub(1) as i64);
        child.messages = self.messages.clone();
        child
    }

    /// Lazily builds (or returns the cached) provider instance, rebuilding it
    /// when `provider_name` has changed since the last build (spec §3 "The
    /// provider instance is created lazily... rebuilt on provider change").
    pub fn ensure_provider(&mut self, credentials: &ikigai_config::Credentials) -> Result<Arc<dyn Provider>> {
        if let Some(p) = &self.provider_instance {
            if p.name() == self.provider_name {
                return Ok(Arc::clone(p));
            }
        }
        let provider = crate::provider::create(&self.provider_name, credentials)?;
        self.provider_instance = Some(Arc::clone(&provider));
        Ok(provider)
    }

    /// Changes provider/model in one step (spec's supplemented `/model`
    /// behavior: thinking level is preserved across a same- or
    /// cross-provider swap, never reset).
    pub fn set_provider_and_model(&mut self, provider_name: impl Into<String>, model: impl Into<String>) {
        let provider_name = provider_name.into();
        if provider_name != self.provider_name {
            self.provider_instance = None;
        }
        self.provider_name = provider_name;
        self.model = model.into();
    }

    pub fn begin_waiting_for_llm(&mut self) {
        self.run_state = RunState::WaitingForLlm;
        self.spinner.visible = true;
    }

    pub fn begin_executing_tool(&mut self, handle: ToolThreadHandle) {
        self.run_state = RunState::ExecutingTool;
        self.spinner.visible = true;
        self.tool_thread = Some(handle);
    }

    pub fn return_to_idle(&mut self) {
        self.run_state = RunState::Idle;
        self.spinner.visible = false;
        self.tool_turns_this_round = 0;
    }

    /// spec §4.14 "exceeding [max_tool_turns] -> append an Error message and
    /// return to Idle".
    pub fn tool_turn_budget_exceeded(&self, max_tool_turns: u32) -> bool {
        self.tool_turns_this_round >= max_tool_turns
    }
}

impl ConversationSource for Agent {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Role;

    #[test]
    fn new_agent_has_no_parent_and_is_idle() {
        let agent = Agent::new("anthropic", "claude-sonnet-4-5", ThinkingLevel::Med);
        assert!(agent.parent_uuid.is_none());
        assert!(agent.fork_message_id.is_none());
        assert_eq!(agent.uuid.len(), 22);
        assert!(agent.input_visible());
        assert!(!agent.spinner_visible());
    }

    #[test]
    fn waiting_for_llm_hides_input_and_shows_spinner() {
        let mut agent = Agent::new("openai", "gpt-5", ThinkingLevel::Med);
        agent.begin_waiting_for_llm();
        assert!(!agent.input_visible());
        assert!(agent.spinner_visible());
        agent.return_to_idle();
        assert!(agent.input_visible());
        assert!(!agent.spinner_visible());
    }

    #[test]
    fn fork_inherits_prefix_and_records_parent() {
        let mut parent = Agent::new("anthropic", "claude-sonnet-4-5", ThinkingLevel::Med);
        parent.append_message(Message::text(Role::User, "hi"));
        parent.append_message(Message::text(Role::Assistant, "hello"));

        let child = parent.fork(ForkOverrides::default());
        assert_eq!(child.parent_uuid.as_deref(), Some(parent.uuid.as_str()));
        assert_eq!(child.fork_message_id, Some(1));
        assert_eq!(child.messages.len(), 2);
        assert_eq!(child.provider_name, "anthropic");
        assert_eq!(child.thinking, ThinkingLevel::Med);
    }

    #[test]
    fn fork_with_model_override_infers_new_provider_and_keeps_thinking() {
        let parent = Agent::new("anthropic", "claude-sonnet-4-5", ThinkingLevel::High);
        let child = parent.fork(ForkOverrides {
            model: Some("gpt-5".to_string()),
            ..Default::default()
        });
        assert_eq!(child.provider_name, "openai");
        assert_eq!(child.thinking, ThinkingLevel::High);
    }

    #[test]
    fn model_swap_preserves_thinking_level() {
        let mut agent = Agent::new("anthropic", "claude-sonnet-4-5", ThinkingLevel::High);
        agent.set_provider_and_model("openai", "gpt-5");
        assert_eq!(agent.thinking, ThinkingLevel::High);
        assert_eq!(agent.provider_name, "openai");
    }

    #[test]
    fn mark_and_rewind_to_mark() {
        let mut agent = Agent::new("openai", "gpt-5", ThinkingLevel::Med);
        agent.append_message(Message::text(Role::User, "one"));
        agent.set_mark("checkpoint");
        agent.append_message(Message::text(Role::User, "two"));
        agent.append_message(Message::text(Role::User, "three"));
        agent.rewind_to_mark("checkpoint").unwrap();
        assert_eq!(agent.messages.len(), 1);
    }

    #[test]
    fn rewind_without_count_drops_last_turn() {
        let mut agent = Agent::new("openai", "gpt-5", ThinkingLevel::Med);
        agent.append_message(Message::text(Role::User, "hi"));
        agent.append_message(Message::text(Role::Assistant, "hello"));
        agent.rewind(None);
        assert!(agent.messages.is_empty());
    }

    #[test]
    fn tool_thread_round_trips_result() {
        let handle = ToolThreadHandle::spawn(|| ToolThreadResult {
            tool_call_id: "call_1".to_string(),
            output_text: "42".to_string(),
            is_error: false,
        });
        while !handle.is_complete() {
            std::thread::yield_now();
        }
        let result = handle.take_result();
        assert_eq!(result.output_text, "42");
    }
}
