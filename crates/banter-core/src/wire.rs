//! JSON bodies exchanged between the chat client, the relay, and the completion API.

use serde::{Deserialize, Serialize};

use crate::state::{ChatRole, ConversationEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl From<ChatRole> for TurnRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => TurnRole::User,
            ChatRole::Assistant => TurnRole::Assistant,
        }
    }
}

/// A role-tagged message as the completion API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: &str) -> Self {
        Self {
            role: TurnRole::System,
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: TurnRole::User,
            content: content.to_string(),
        }
    }
}

impl From<&ConversationEntry> for ChatTurn {
    fn from(entry: &ConversationEntry) -> Self {
        Self {
            role: entry.role.into(),
            content: entry.text.clone(),
        }
    }
}

/// Body of `POST /ai-chat`. Older clients send `message` instead of `prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(alias = "message")]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatTurn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReply {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Body of `GET /ai/chat`: raw reply texts without role attribution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HistoryReply {
    pub messages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_legacy_message_field() {
        let request: RelayRequest = serde_json::from_value(json!({"message": "hey"})).unwrap();
        assert_eq!(request.prompt, "hey");
        assert!(request.model.is_none());
        assert!(request.history.is_none());
    }

    #[test]
    fn test_request_serializes_without_empty_options() {
        let request = RelayRequest {
            prompt: "Hello".into(),
            model: Some("llama3".into()),
            history: Some(vec![ChatTurn::system("Be kind.")]),
            session_id: None,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "prompt": "Hello",
                "model": "llama3",
                "history": [{"role": "system", "content": "Be kind."}],
            })
        );
    }
}
