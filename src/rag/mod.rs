//! Retrieval side of the chat pipeline.
//!
//! - `RagStore`: vector index abstraction, with `SqliteRagStore` as the
//!   persisted implementation
//! - `Retriever`: fixed top-5 similarity search used by the chat pipeline
//! - `Ingestor`: chunking and embedding of source documents

mod ingest;
mod retriever;
mod sqlite;
mod store;

pub use ingest::{Ingestor, TextChunk};
pub use retriever::{Document, RetrievalResult, Retriever, SEARCH_K};
pub use sqlite::SqliteRagStore;
pub use store::{ChunkSearchResult, RagStore, StoredChunk};
