use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::store::{ChunkSearchResult, RagStore};
use crate::core::errors::RagError;
use crate::llm::EmbeddingProvider;

/// Number of documents handed to the answering prompt.
pub const SEARCH_K: usize = 5;

/// A retrieved chunk as seen by the answering step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    pub source: String,
    pub chunk_id: String,
    pub score: f32,
    pub metadata: Option<serde_json::Value>,
}

impl From<ChunkSearchResult> for Document {
    fn from(result: ChunkSearchResult) -> Self {
        Self {
            page_content: result.chunk.content,
            source: result.chunk.source,
            chunk_id: result.chunk.chunk_id,
            score: result.score,
            metadata: result.chunk.metadata,
        }
    }
}

/// Ranked by descending similarity, at most `SEARCH_K` long.
pub type RetrievalResult = Vec<Document>;

/// Top-k similarity search over a `RagStore`.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn RagStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn RagStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult, RagError> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = vectors
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RagError::embedder("embedding service returned no vector"))?;

        let mut results = self.store.search(&query_embedding, SEARCH_K).await?;
        results.truncate(SEARCH_K);

        tracing::debug!(
            embedder = self.embedder.name(),
            documents = results.len(),
            "retrieved documents"
        );

        Ok(results.into_iter().map(Document::from).collect())
    }
}
