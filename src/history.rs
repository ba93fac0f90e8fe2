//! Conversation turns and history windowing.
//!
//! Information Hiding:
//! - Message sequencing rules (which turns count as "past") live here
//! - Prompt rendering of history hidden from the storage layer

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when rendering history into a prompt.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Role::User => "Human",
            Role::Assistant => "AI",
        }
    }
}

/// One immutable conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Ordered, append-only sequence of turns for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The sub-sequence usable as conversational context.
    ///
    /// A trailing user message has no reply yet; it is the in-flight
    /// question, not history, and is excluded. Everything earlier is
    /// returned unchanged, in order.
    pub fn past_messages(&self) -> &[Message] {
        match self.messages.last() {
            Some(last) if last.role == Role::User => &self.messages[..self.messages.len() - 1],
            _ => &self.messages,
        }
    }
}

/// Render messages as alternating `Human:`/`AI:` prompt lines.
pub fn render_prompt_lines(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.prompt_label(), m.text))
        .collect::<Vec<_>>()
        .join("\n")
}
