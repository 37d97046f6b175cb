use std::sync::Arc;

use crate::core::config::defaults::CONTEXT_PLACEHOLDER;
use crate::core::errors::RagError;
use crate::history::ConversationTurn;
use crate::llm::{ChatMessage, ChatRequest, GenerationParams, LlmProvider};
use crate::rag::Document;

const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Answers the user's original question with retrieved documents stuffed
/// into the system instruction.
pub struct Answerer {
    llm: Arc<dyn LlmProvider>,
    system_prompt: String,
    params: GenerationParams,
}

impl Answerer {
    /// `system_prompt` should contain `{context}`; it is replaced by the
    /// document texts.
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

    pub fn build_messages(
        &self,
        history: &[ConversationTurn],
        input: &str,
        documents: &[Document],
    ) -> Vec<ChatMessage> {
        let system = self
            .system_prompt
            .replace(CONTEXT_PLACEHOLDER, &format_context(documents));

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history.iter().map(ConversationTurn::to_message));
        messages.push(ChatMessage::user(input));
        messages
    }

    pub async fn answer(
        &self,
        history: &[ConversationTurn],
        input: &str,
        documents: &[Document],
    ) -> Result<String, RagError> {
        if documents.is_empty() {
            tracing::debug!("No documents retrieved; answering without context");
        }

        let messages = self.build_messages(history, input, documents);
        let request = ChatRequest::new(messages).with_params(&self.params);
        self.llm.chat(request).await
    }
}

/// Document texts in retrieval order, blank-line separated.
pub fn format_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| doc.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}
