use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use super::orchestrator::ChatOrchestrator;
use crate::core::errors::RagError;
use crate::history::ConversationHistory;

type SharedHistory = Arc<Mutex<ConversationHistory>>;

/// Conversation histories keyed by id.
///
/// A conversation's lock is held for the whole pipeline, so two messages to
/// the same conversation are answered one after the other. Different
/// conversations do not block each other.
#[derive(Clone)]
pub struct ChatSessions {
    orchestrator: Arc<ChatOrchestrator>,
    conversations: Arc<RwLock<HashMap<String, SharedHistory>>>,
}

impl ChatSessions {
    pub fn new(orchestrator: Arc<ChatOrchestrator>) -> Self {
        Self {
            orchestrator,
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn chat(&self, conversation_id: &str, input: &str) -> Result<String, RagError> {
        let conversation_id = validate_conversation_id(conversation_id)?;
        let history = self.get_or_create(conversation_id);

        let mut history = history.lock().await;
        self.orchestrator.chat(input, Some(&mut history)).await
    }

    /// Copy of the conversation's turns; empty for unknown ids.
    pub async fn history(&self, conversation_id: &str) -> ConversationHistory {
        let conversation_id = normalize_conversation_id(conversation_id);
        let entry = {
            let guard = self.conversations.read().unwrap_or_else(|e| e.into_inner());
            guard.get(conversation_id).cloned()
        };

        match entry {
            Some(history) => history.lock().await.clone(),
            None => ConversationHistory::new(),
        }
    }

    /// Forgets a conversation. Returns false if it did not exist.
    pub fn reset(&self, conversation_id: &str) -> bool {
        let conversation_id = normalize_conversation_id(conversation_id);
        let removed = self
            .conversations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(conversation_id)
            .is_some();

        if removed {
            tracing::info!("Reset conversation {}", conversation_id);
        }
        removed
    }

    pub fn ids(&self) -> Vec<String> {
        let guard = self.conversations.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = guard.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn get_or_create(&self, conversation_id: &str) -> SharedHistory {
        if let Some(existing) = self
            .conversations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(conversation_id)
        {
            return existing.clone();
        }

        self.conversations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }
}

fn normalize_conversation_id(conversation_id: &str) -> &str {
    conversation_id.trim()
}

fn validate_conversation_id(conversation_id: &str) -> Result<&str, RagError> {
    let trimmed = normalize_conversation_id(conversation_id);
    if trimmed.is_empty() {
        return Err(RagError::BadRequest(
            "conversation id must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}
