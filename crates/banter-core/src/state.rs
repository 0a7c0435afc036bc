//! UI-agnostic conversation state
//!
//! The session state is only ever changed through [`SessionState::reduce`], which takes
//! an [`Action`] and returns a fresh snapshot. Nothing in here performs I/O, so the same
//! store backs the terminal client and the tests alike.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One turn of the conversation. Entries are never edited after they are appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: ChatRole,
    pub text: String,
}

/// A state transition request.
///
/// Decodes from `{"type": "SET_MODEL", "payload": "codellama"}` style objects. Any tag
/// that isn't listed here becomes [`Action::Unknown`] whatever its payload, and leaves
/// the state alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    UserInput(String),
    AiOutput(String),
    SetLoading(bool),
    SetTyping(String),
    SetModel(String),
    SetInstruction(String),
    ClearConversation,
    Unknown,
}

#[derive(Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let RawAction { kind, payload } = RawAction::deserialize(deserializer)?;

        fn arg<T: DeserializeOwned, E: de::Error>(payload: Value) -> Result<T, E> {
            serde_json::from_value(payload).map_err(E::custom)
        }

        Ok(match kind.as_str() {
            "USER_INPUT" => Action::UserInput(arg(payload)?),
            "AI_OUTPUT" => Action::AiOutput(arg(payload)?),
            "SET_LOADING" => Action::SetLoading(arg(payload)?),
            "SET_TYPING" => Action::SetTyping(arg(payload)?),
            "SET_MODEL" => Action::SetModel(arg(payload)?),
            "SET_INSTRUCTION" => Action::SetInstruction(arg(payload)?),
            "CLEAR_CONVERSATION" => Action::ClearConversation,
            _ => Action::Unknown,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub conversation: Vec<ConversationEntry>,
    /// True only while the relay request is in flight.
    pub loading: bool,
    /// Partial reveal buffer, empty unless the typing animation is running.
    pub typing_text: String,
    pub selected_model: String,
    /// Last instruction set through SET_INSTRUCTION. Requests always take their system
    /// turn from the per-model table.
    pub system_instruction: String,
}

impl SessionState {
    pub fn new(selected_model: &str, system_instruction: &str) -> Self {
        Self {
            conversation: Vec::new(),
            loading: false,
            typing_text: String::new(),
            selected_model: selected_model.to_string(),
            system_instruction: system_instruction.to_string(),
        }
    }

    /// Apply `action` to a copy of this state.
    pub fn reduce(&self, action: Action) -> SessionState {
        let mut next = self.clone();
        match action {
            Action::UserInput(text) => next.conversation.push(ConversationEntry {
                role: ChatRole::User,
                text,
            }),
            Action::AiOutput(text) => next.conversation.push(ConversationEntry {
                role: ChatRole::Assistant,
                text,
            }),
            Action::SetLoading(loading) => next.loading = loading,
            Action::SetTyping(text) => next.typing_text = text,
            Action::SetModel(model) => next.selected_model = model,
            Action::SetInstruction(text) => next.system_instruction = text,
            Action::ClearConversation => next.conversation.clear(),
            Action::Unknown => {}
        }
        next
    }

    /// Whether an exchange is running (waiting on the relay or replaying a reply).
    pub fn is_busy(&self) -> bool {
        self.loading || !self.typing_text.is_empty()
    }
}

/// Holds the current snapshot and applies dispatched actions to it.
#[derive(Debug, Clone, Default)]
pub struct Store {
    state: SessionState,
}

impl Store {
    pub fn new(state: SessionState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn dispatch(&mut self, action: Action) {
        self.state = self.state.reduce(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SessionState {
        SessionState::new("llama3", "")
    }

    #[test]
    fn test_conversation_preserves_dispatch_order() {
        let mut store = Store::new(fresh());
        store.dispatch(Action::UserInput("one".into()));
        store.dispatch(Action::AiOutput("two".into()));
        store.dispatch(Action::UserInput("three".into()));
        store.dispatch(Action::SetLoading(true));

        let conversation = &store.state().conversation;
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[0].role, ChatRole::User);
        assert_eq!(conversation[1].role, ChatRole::Assistant);
        let texts: Vec<&str> = conversation.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three"]);
    }

    #[test]
    fn test_reduce_leaves_prior_snapshot_untouched() {
        let before = fresh();
        let after = before.reduce(Action::UserInput("hi".into()));
        assert!(before.conversation.is_empty());
        assert_eq!(after.conversation.len(), 1);
    }

    #[test]
    fn test_clear_keeps_model_and_instruction() {
        let mut store = Store::new(SessionState::new("gemma", "Be brief."));
        for i in 0..5 {
            store.dispatch(Action::UserInput(format!("q{i}")));
            store.dispatch(Action::AiOutput(format!("a{i}")));
        }
        store.dispatch(Action::ClearConversation);

        assert!(store.state().conversation.is_empty());
        assert_eq!(store.state().selected_model, "gemma");
        assert_eq!(store.state().system_instruction, "Be brief.");
    }

    #[test]
    fn test_set_loading_is_idempotent() {
        let base = fresh().reduce(Action::SetLoading(true));
        let once = base.reduce(Action::SetLoading(false));
        let twice = once.reduce(Action::SetLoading(false));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_set_typing_replaces_buffer() {
        let state = fresh()
            .reduce(Action::SetTyping("Hel".into()))
            .reduce(Action::SetTyping("Hello".into()));
        assert_eq!(state.typing_text, "Hello");
        assert!(state.is_busy());
        assert!(!state.reduce(Action::SetTyping(String::new())).is_busy());
    }

    #[test]
    fn test_action_decodes_tagged_json() {
        let action: Action =
            serde_json::from_str(r#"{"type":"SET_MODEL","payload":"codellama"}"#).unwrap();
        assert_eq!(action, Action::SetModel("codellama".into()));

        let clear: Action = serde_json::from_str(r#"{"type":"CLEAR_CONVERSATION"}"#).unwrap();
        assert_eq!(clear, Action::ClearConversation);

        let loading: Action =
            serde_json::from_str(r#"{"type":"SET_LOADING","payload":true}"#).unwrap();
        assert_eq!(loading, Action::SetLoading(true));
        assert!(serde_json::from_str::<Action>(r#"{"type":"SET_MODEL","payload":3}"#).is_err());
    }

    #[test]
    fn test_unknown_action_is_a_noop() {
        let action: Action = serde_json::from_str(r#"{"type":"SET_ROLE"}"#).unwrap();
        assert_eq!(action, Action::Unknown);
        let with_payload: Action =
            serde_json::from_str(r#"{"type":"SET_ROLE","payload":"system"}"#).unwrap();
        assert_eq!(with_payload, Action::Unknown);

        let state = fresh().reduce(Action::UserInput("x".into()));
        assert_eq!(state.reduce(action), state);
    }
}
