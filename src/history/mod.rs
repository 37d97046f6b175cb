//! Conversation log passed between chat calls.
//!
//! The log is append-only: turns are added in (user, assistant) pairs after a
//! successful answer and are never reordered or removed.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;
use crate::llm::{ChatMessage, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content")]
pub enum ConversationTurn {
    #[serde(rename = "human", alias = "user")]
    User(String),
    #[serde(rename = "ai", alias = "assistant")]
    Assistant(String),
}

impl ConversationTurn {
    pub fn text(&self) -> &str {
        match self {
            ConversationTurn::User(text) | ConversationTurn::Assistant(text) => text,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            ConversationTurn::User(_) => Role::User,
            ConversationTurn::Assistant(_) => Role::Assistant,
        }
    }

    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role(),
            content: self.text().to_string(),
        }
    }

    /// Accepts LangChain-style (`human`/`ai`) and OpenAI-style
    /// (`user`/`assistant`) role names.
    pub fn from_role(role: &str, content: impl Into<String>) -> Result<Self, RagError> {
        match role.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Ok(ConversationTurn::User(content.into())),
            "assistant" | "ai" => Ok(ConversationTurn::Assistant(content.into())),
            other => Err(RagError::MalformedHistory(format!(
                "unsupported role '{}' in history",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The last `limit` turns, or all of them when `limit` is `None`.
    ///
    /// A window that would open on an assistant turn drops that turn, so the
    /// prompt never starts mid-exchange. An odd `limit` therefore yields
    /// `limit - 1` turns.
    pub fn recent(&self, limit: Option<usize>) -> &[ConversationTurn] {
        match limit {
            Some(limit) if limit < self.turns.len() => {
                let window = &self.turns[self.turns.len() - limit..];
                match window.first() {
                    Some(ConversationTurn::Assistant(_)) => &window[1..],
                    _ => window,
                }
            }
            _ => &self.turns,
        }
    }

    /// Appends one completed exchange. Both turns land together.
    pub fn record_exchange(&mut self, user_input: impl Into<String>, answer: impl Into<String>) {
        self.turns.reserve(2);
        self.turns.push(ConversationTurn::User(user_input.into()));
        self.turns.push(ConversationTurn::Assistant(answer.into()));
    }
}

impl Deref for ConversationHistory {
    type Target = [ConversationTurn];

    fn deref(&self) -> &Self::Target {
        &self.turns
    }
}

impl From<Vec<ConversationTurn>> for ConversationHistory {
    fn from(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }
}

impl TryFrom<Vec<ChatMessage>> for ConversationHistory {
    type Error = RagError;

    fn try_from(messages: Vec<ChatMessage>) -> Result<Self, Self::Error> {
        let turns = messages
            .into_iter()
            .enumerate()
            .map(|(index, message)| match message.role {
                Role::User => Ok(ConversationTurn::User(message.content)),
                Role::Assistant => Ok(ConversationTurn::Assistant(message.content)),
                Role::System => Err(RagError::MalformedHistory(format!(
                    "system message at position {} cannot be part of history",
                    index
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { turns })
    }
}
