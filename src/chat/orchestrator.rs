//! ChatOrchestrator — rewrite, retrieve, answer, then log the exchange.

use std::sync::Arc;

use serde::Serialize;

use super::answerer::Answerer;
use super::rewriter::QueryRewriter;
use crate::core::config::RagSettings;
use crate::core::errors::RagError;
use crate::history::ConversationHistory;
use crate::llm::{EmbeddingProvider, GenerationParams, LlmProvider};
use crate::rag::{Document, RagStore, Retriever};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatOptions {
    /// When false, a conversation's first message is used as the search
    /// query directly instead of being rewritten.
    pub rewrite_first_turn: bool,
    /// Most recent turns shown to the model; `None` sends the whole history.
    pub max_history_turns: Option<usize>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            rewrite_first_turn: true,
            max_history_turns: None,
        }
    }
}

/// Everything one pass of the pipeline produced.
#[derive(Debug, Clone, Serialize)]
pub struct ChainOutput {
    pub input: String,
    /// Query actually sent to the retriever.
    pub standalone_query: String,
    pub context: Vec<Document>,
    pub answer: String,
}

pub struct ChatOrchestrator {
    rewriter: QueryRewriter,
    retriever: Retriever,
    answerer: Answerer,
    options: ChatOptions,
}

impl ChatOrchestrator {
    pub fn new(rewriter: QueryRewriter, retriever: Retriever, answerer: Answerer) -> Self {
        Self {
            rewriter,
            retriever,
            answerer,
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    /// Wires the pipeline from settings and injected collaborators.
    pub fn from_settings(
        settings: &RagSettings,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn RagStore>,
    ) -> Self {
        let params = GenerationParams::from(&settings.llm);
        let rewriter =
            QueryRewriter::new(llm.clone(), settings.chat.contextualize_prompt.clone())
                .with_params(params);
        let answerer = Answerer::new(llm, settings.chat.qa_prompt.clone()).with_params(params);
        let retriever = Retriever::new(embedder, store);

        Self::new(rewriter, retriever, answerer).with_options(ChatOptions {
            rewrite_first_turn: settings.chat.rewrite_first_turn,
            max_history_turns: settings.chat.max_history_turns,
        })
    }

    pub fn options(&self) -> ChatOptions {
        self.options
    }

    /// Runs the pipeline without touching `history`.
    pub async fn invoke(
        &self,
        input: &str,
        history: &ConversationHistory,
    ) -> Result<ChainOutput, RagError> {
        if input.trim().is_empty() {
            return Err(RagError::BadRequest("user input must not be empty".to_string()));
        }

        let turns = history.recent(self.options.max_history_turns);

        let standalone_query = if turns.is_empty() && !self.options.rewrite_first_turn {
            input.to_string()
        } else {
            let rewritten = self.rewriter.rewrite(turns, input).await?;
            if rewritten.trim().is_empty() {
                tracing::warn!("Rewrite came back empty; retrieving with the original input");
                input.to_string()
            } else {
                rewritten
            }
        };

        let context = self.retriever.retrieve(&standalone_query).await?;
        let answer = self.answerer.answer(turns, input, &context).await?;

        Ok(ChainOutput {
            input: input.to_string(),
            standalone_query,
            context,
            answer,
        })
    }

    /// Answers `input` and appends the exchange to `history`.
    ///
    /// With `None`, a fresh history is used for this call only. On error the
    /// history is left exactly as it was.
    pub async fn chat(
        &self,
        input: &str,
        history: Option<&mut ConversationHistory>,
    ) -> Result<String, RagError> {
        let mut fresh = ConversationHistory::new();
        let history = match history {
            Some(history) => history,
            None => &mut fresh,
        };

        tracing::info!(history_turns = history.len(), "chat request");

        let output = self.invoke(input, history).await?;
        history.record_exchange(output.input, output.answer.clone());

        tracing::info!(
            documents = output.context.len(),
            answer_chars = output.answer.len(),
            "chat answered"
        );
        Ok(output.answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{chunk, KeywordEmbedder, MemoryStore, ScriptedLlm};
    use crate::history::ConversationTurn;
    use crate::llm::Role;

    struct Fixture {
        llm: Arc<ScriptedLlm>,
        embedder: Arc<KeywordEmbedder>,
        orchestrator: ChatOrchestrator,
    }

    async fn fixture(llm: ScriptedLlm, docs: &[(&str, &str)], options: ChatOptions) -> Fixture {
        let llm = Arc::new(llm);
        let embedder = Arc::new(KeywordEmbedder::new(&["refund", "shipping", "office"]));
        let store = Arc::new(MemoryStore::default());
        for (id, text) in docs {
            let vector = embedder.embed(&[text.to_string()]).await.unwrap().remove(0);
            store.insert(chunk(id, text), vector).await.unwrap();
        }
        embedder.forget_calls();

        let orchestrator = ChatOrchestrator::new(
            QueryRewriter::new(llm.clone(), "rewrite"),
            Retriever::new(embedder.clone(), store),
            Answerer::new(llm.clone(), "context:\n{context}"),
        )
        .with_options(options);

        Fixture {
            llm,
            embedder,
            orchestrator,
        }
    }

    #[tokio::test]
    async fn absent_history_returns_answer() {
        let f = fixture(ScriptedLlm::replying(["q", "Hello!"]), &[], ChatOptions::default()).await;

        let answer = f.orchestrator.chat("hi there", None).await.unwrap();

        assert_eq!(answer, "Hello!");
        assert_eq!(f.llm.calls(), 2);
    }

    #[tokio::test]
    async fn empty_history_grows_by_exactly_two() {
        let f = fixture(ScriptedLlm::replying(["q", "a"]), &[], ChatOptions::default()).await;
        let mut history = ConversationHistory::new();

        f.orchestrator.chat("hi", Some(&mut history)).await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(
            history.turns(),
            &[
                ConversationTurn::User("hi".into()),
                ConversationTurn::Assistant("a".into()),
            ]
        );
    }

    #[tokio::test]
    async fn prior_turns_are_kept_and_new_ones_appended() {
        let llm = ScriptedLlm::replying(["standalone C", "answer C"]);
        let f = fixture(llm, &[], ChatOptions::default()).await;
        let mut history = ConversationHistory::from(vec![
            ConversationTurn::User("A".into()),
            ConversationTurn::Assistant("B".into()),
        ]);

        let answer = f.orchestrator.chat("C", Some(&mut history)).await.unwrap();

        assert_eq!(
            history.turns(),
            &[
                ConversationTurn::User("A".into()),
                ConversationTurn::Assistant("B".into()),
                ConversationTurn::User("C".into()),
                ConversationTurn::Assistant(answer),
            ]
        );
    }

    #[tokio::test]
    async fn rewritten_query_drives_retrieval_but_answer_sees_original_input() {
        let f = fixture(
            ScriptedLlm::replying(["What is the refund window?", "30 days."]),
            &[
                ("r", "Refund requests are accepted for 30 days."),
                ("s", "Shipping takes a week."),
            ],
            ChatOptions::default(),
        )
        .await;
        let mut history = ConversationHistory::from(vec![
            ConversationTurn::User("Do you do refunds?".into()),
            ConversationTurn::Assistant("Yes.".into()),
        ]);

        let output = f.orchestrator.invoke("how long?", &history).await.unwrap();

        assert_eq!(output.standalone_query, "What is the refund window?");
        assert_eq!(f.embedder.embedded_texts(), vec!["What is the refund window?"]);
        assert_eq!(output.context[0].chunk_id, "r");

        let answer_request = &f.llm.requests()[1];
        let last = answer_request.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "how long?");
        assert!(answer_request.messages[0]
            .content
            .starts_with("context:\nRefund requests are accepted for 30 days."));

        // invoke leaves history alone
        assert_eq!(history.len(), 2);
        f.orchestrator.chat("how long?", Some(&mut history)).await.unwrap();
        assert_eq!(history.len(), 4);
    }

    #[tokio::test]
    async fn answer_failure_leaves_history_untouched() {
        let f = fixture(ScriptedLlm::failing_after(1), &[], ChatOptions::default()).await;
        let mut history = ConversationHistory::from(vec![
            ConversationTurn::User("A".into()),
            ConversationTurn::Assistant("B".into()),
        ]);
        let before = history.clone();

        let err = f.orchestrator.chat("C", Some(&mut history)).await.unwrap_err();

        assert!(matches!(err, RagError::CollaboratorUnavailable { .. }));
        assert_eq!(f.llm.calls(), 2);
        assert_eq!(history, before);
    }

    #[tokio::test]
    async fn rewrite_failure_skips_retrieval_and_history() {
        let f = fixture(ScriptedLlm::failing(), &[], ChatOptions::default()).await;
        let mut history = ConversationHistory::new();

        assert!(f.orchestrator.chat("hi", Some(&mut history)).await.is_err());

        assert!(f.embedder.embedded_texts().is_empty());
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn empty_index_still_produces_an_answer() {
        let llm = ScriptedLlm::replying(["q", "No context, but hello."]);
        let f = fixture(llm, &[], ChatOptions::default()).await;

        let output = f.orchestrator.invoke("anything", &ConversationHistory::new()).await.unwrap();

        assert!(output.context.is_empty());
        assert!(!output.answer.is_empty());
        assert_eq!(f.llm.requests()[1].messages[0].content, "context:\n");
    }

    #[tokio::test]
    async fn repeated_input_is_never_cached() {
        let f = fixture(ScriptedLlm::replying([]), &[], ChatOptions::default()).await;
        let history = ConversationHistory::new();

        f.orchestrator.invoke("same question", &history).await.unwrap();
        f.orchestrator.invoke("same question", &history).await.unwrap();

        assert_eq!(f.llm.calls(), 4);
        assert_eq!(f.embedder.embedded_texts().len(), 2);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_any_call() {
        let f = fixture(ScriptedLlm::replying([]), &[], ChatOptions::default()).await;
        let mut history = ConversationHistory::new();

        let err = f.orchestrator.chat("   ", Some(&mut history)).await.unwrap_err();

        assert!(matches!(err, RagError::BadRequest(_)));
        assert_eq!(f.llm.calls(), 0);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn first_turn_can_skip_the_rewrite() {
        let options = ChatOptions {
            rewrite_first_turn: false,
            max_history_turns: None,
        };
        let f = fixture(ScriptedLlm::replying(["only answer"]), &[], options).await;
        let mut history = ConversationHistory::new();

        let answer = f.orchestrator.chat("office hours?", Some(&mut history)).await.unwrap();

        assert_eq!(answer, "only answer");
        assert_eq!(f.llm.calls(), 1);
        assert_eq!(f.embedder.embedded_texts(), vec!["office hours?"]);

        // Later turns are rewritten again
        f.orchestrator.chat("and weekends?", Some(&mut history)).await.unwrap();
        assert_eq!(f.llm.calls(), 3);
    }

    #[tokio::test]
    async fn blank_rewrite_falls_back_to_input() {
        let f = fixture(ScriptedLlm::replying(["  \n", "fine"]), &[], ChatOptions::default()).await;

        let output = f
            .orchestrator
            .invoke("shipping cost?", &ConversationHistory::new())
            .await
            .unwrap();

        assert_eq!(output.standalone_query, "shipping cost?");
    }

    #[tokio::test]
    async fn history_window_limits_prompt_turns_only() {
        let options = ChatOptions {
            rewrite_first_turn: true,
            max_history_turns: Some(2),
        };
        let f = fixture(ScriptedLlm::replying([]), &[], options).await;
        let mut history = ConversationHistory::new();
        history.record_exchange("q1", "a1");
        history.record_exchange("q2", "a2");

        f.orchestrator.chat("q3", Some(&mut history)).await.unwrap();

        let rewrite_request = &f.llm.requests()[0];
        assert_eq!(rewrite_request.messages.len(), 4);
        assert_eq!(rewrite_request.messages[1].content, "q2");
        assert_eq!(history.len(), 6);
    }

    #[test]
    fn from_settings_carries_chat_options() {
        let mut settings = RagSettings::default();
        settings.chat.rewrite_first_turn = false;
        settings.chat.max_history_turns = Some(8);

        let orchestrator = ChatOrchestrator::from_settings(
            &settings,
            Arc::new(ScriptedLlm::replying([])),
            Arc::new(KeywordEmbedder::new(&[])),
            Arc::new(MemoryStore::default()),
        );

        assert_eq!(
            orchestrator.options(),
            ChatOptions {
                rewrite_first_turn: false,
                max_history_turns: Some(8),
            }
        );
    }
}
