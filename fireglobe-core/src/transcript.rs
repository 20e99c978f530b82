//! Messages and transcripts.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who spoke. Anything that is not the persona counts as the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(other)]
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }

    /// Label used when replaying the dialogue to the persona
    fn dialogue_label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Agent => "Agent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// `You: ...` / `Agent: ...` lines separated by blank lines
pub fn render_dialogue(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.dialogue_label(), m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `USER: ...` / `AGENT: ...` lines, one per message
pub fn render_for_evaluation(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append-only message history for one persona conversation.
///
/// Once closed (for evaluation or storage) further appends are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub conversation_id: String,
    pub personality_name: String,
    messages: Vec<Message>,
    #[serde(default)]
    closed: bool,
}

impl Transcript {
    pub fn new(conversation_id: impl Into<String>, personality_name: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            personality_name: personality_name.into(),
            messages: Vec::new(),
            closed: false,
        }
    }

    pub fn push(&mut self, message: Message) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_argument("transcript is closed")
                .with_operation("transcript::push")
                .with_context("conversation_id", self.conversation_id.clone()));
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
