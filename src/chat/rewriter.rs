use std::sync::Arc;

use crate::core::errors::RagError;
use crate::history::ConversationTurn;
use crate::llm::{ChatMessage, ChatRequest, GenerationParams, LlmProvider};

/// Turns the latest user message into a question that stands on its own,
/// so retrieval does not depend on earlier turns.
pub struct QueryRewriter {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
    params: GenerationParams,
}

impl QueryRewriter {
    pub fn new(llm: Arc<dyn LlmProvider>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn build_messages(&self, history: &[ConversationTurn], input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history.iter().map(ConversationTurn::to_message));
        messages.push(ChatMessage::user(input));
        messages
    }

    /// One model call per invocation; the completion is returned untouched.
    pub async fn rewrite(
        &self,
        history: &[ConversationTurn],
        input: &str,
    ) -> Result<String, RagError> {
        let messages = self.build_messages(history, input);
        let request = ChatRequest::new(messages).with_params(&self.params);
        let standalone = self.llm.chat(request).await?;

        tracing::debug!(
            provider = self.llm.name(),
            history_turns = history.len(),
            "rewrote question: {}",
            standalone
        );
        Ok(standalone)
    }
}
