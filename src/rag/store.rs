//! RagStore trait — abstract interface for vector index backends.
//!
//! The retriever only needs `search`; the remaining methods serve the
//! ingestion path. The bundled implementation is `SqliteRagStore`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// A stored chunk with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Unique chunk identifier.
    pub chunk_id: String,
    /// The text content of the chunk.
    pub content: String,
    /// Source identifier (file name, URL, ...).
    pub source: String,
    /// Optional metadata (JSON).
    pub metadata: Option<serde_json::Value>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Similarity score (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Insert a chunk with its embedding vector.
    async fn insert(&self, chunk: StoredChunk, embedding: Vec<f32>) -> Result<(), RagError>;

    /// Insert multiple chunks in one transaction.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), RagError>;

    /// At most `limit` chunks, most similar first.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, RagError>;

    async fn count(&self) -> Result<usize, RagError>;

    /// Remove every chunk ingested from `source`.
    async fn delete_by_source(&self, source: &str) -> Result<usize, RagError>;

    /// Remove every chunk.
    async fn clear(&self) -> Result<usize, RagError>;
}
