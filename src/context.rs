use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sandbox::staging::new_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Worker or tool that produced the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, name: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            role,
            name: name.map(str::to_string),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Conversation state of one user request, passed explicitly to the
/// router and the dispatcher instead of living in process-wide state.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    history: Vec<ChatMessage>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: new_token(),
            history: Vec::new(),
        }
    }

    pub fn from_user(prompt: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.push(ChatMessage::new(Role::User, None, prompt));
        ctx
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.history.last()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contexts_are_independent() {
        let mut a = RequestContext::from_user("lint this");
        let b = RequestContext::from_user("explain this");
        a.push(ChatMessage::new(Role::Assistant, Some("Linter"), "done"));

        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.history().len(), 2);
        assert_eq!(b.history().len(), 1);
        assert_eq!(a.last().unwrap().name.as_deref(), Some("Linter"));
    }
}
