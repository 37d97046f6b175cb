//! SQLite-backed vector index.
//!
//! Chunk text and metadata live in SQLite alongside little-endian f32
//! embedding blobs; search is brute-force cosine similarity.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkSearchResult, RagStore, StoredChunk};
use crate::core::errors::RagError;
use crate::vector_math::rank_descending_by_cosine;

const DB_FILE_NAME: &str = "rag.db";

pub struct SqliteRagStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteRagStore {
    /// Opens (or creates) the index persisted in `persist_dir`.
    pub async fn open(persist_dir: &Path) -> Result<Self, RagError> {
        std::fs::create_dir_all(persist_dir).map_err(RagError::index)?;
        Self::with_path(persist_dir.join(DB_FILE_NAME)).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, RagError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RagError::index)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                metadata TEXT DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::index)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rag_source ON rag_chunks(source)")
            .execute(&self.pool)
            .await
            .map_err(RagError::index)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RagError::index)?;

        Ok(())
    }

    /// Records `embedding_model` and drops every stored vector if the index
    /// was built with a different model. Returns true when vectors were dropped.
    pub async fn ensure_embedding_model(&self, embedding_model: &str) -> Result<bool, RagError> {
        let current: Option<String> =
            sqlx::query_scalar("SELECT value FROM rag_meta WHERE key = 'embedding_model'")
                .fetch_optional(&self.pool)
                .await
                .map_err(RagError::index)?;

        if current.as_deref() == Some(embedding_model) {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await.map_err(RagError::index)?;

        let cleared = match current {
            Some(previous) => {
                tracing::warn!(
                    "Embedding model changed from {} to {}; clearing vector index",
                    previous,
                    embedding_model
                );
                sqlx::query("DELETE FROM rag_chunks")
                    .execute(&mut *tx)
                    .await
                    .map_err(RagError::index)?;
                true
            }
            None => false,
        };

        sqlx::query(
            "INSERT OR REPLACE INTO rag_meta (key, value, updated_at)
             VALUES ('embedding_model', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(embedding_model)
        .execute(&mut *tx)
        .await
        .map_err(RagError::index)?;

        tx.commit().await.map_err(RagError::index)?;
        Ok(cleared)
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn metadata_to_string(chunk: &StoredChunk) -> String {
        chunk
            .metadata
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "{}".to_string())
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        let metadata_str: Option<String> = row.get("metadata");
        let metadata = metadata_str.and_then(|s| serde_json::from_str::<Value>(&s).ok());

        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            metadata,
        }
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    async fn insert(&self, chunk: StoredChunk, embedding: Vec<f32>) -> Result<(), RagError> {
        self.insert_batch(vec![(chunk, embedding)]).await
    }

    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), RagError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(RagError::index)?;

        for (chunk, embedding) in &items {
            if embedding.is_empty() {
                return Err(RagError::BadRequest(format!(
                    "chunk {} has an empty embedding",
                    chunk.chunk_id
                )));
            }

            sqlx::query(
                "INSERT OR REPLACE INTO rag_chunks (chunk_id, content, source, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(Self::metadata_to_string(chunk))
            .bind(Self::serialize_embedding(embedding))
            .execute(&mut *tx)
            .await
            .map_err(RagError::index)?;
        }

        tx.commit().await.map_err(RagError::index)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, RagError> {
        if limit == 0 || query_embedding.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT chunk_id, content, source, metadata, embedding
             FROM rag_chunks
             ORDER BY created_at ASC, chunk_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RagError::index)?;

        let mut candidates = Vec::with_capacity(rows.len());
        let mut embeddings = Vec::with_capacity(rows.len());
        for row in &rows {
            let bytes: Option<Vec<u8>> = row.get("embedding");
            let embedding = Self::deserialize_embedding(&bytes.unwrap_or_default());
            if embedding.len() != query_embedding.len() {
                continue;
            }
            candidates.push(row);
            embeddings.push(embedding);
        }

        let skipped = rows.len() - candidates.len();
        if skipped > 0 {
            tracing::warn!(
                "Skipped {} chunks whose embedding dimension differs from the query",
                skipped
            );
        }

        let ranked = rank_descending_by_cosine(query_embedding, &embeddings)?;

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(idx, score)| ChunkSearchResult {
                chunk: Self::row_to_chunk(candidates[idx]),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rag_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(RagError::index)?;

        Ok(count as usize)
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM rag_chunks WHERE source = ?1")
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(RagError::index)?;

        Ok(result.rows_affected() as usize)
    }

    async fn clear(&self) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM rag_chunks")
            .execute(&self.pool)
            .await
            .map_err(RagError::index)?;

        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(dir: &tempfile::TempDir) -> SqliteRagStore {
        SqliteRagStore::open(dir.path()).await.unwrap()
    }

    fn make_chunk(id: &str, content: &str, source: &str) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            source: source.to_string(),
            metadata: Some(serde_json::json!({ "start_offset": 0 })),
        }
    }

    #[tokio::test]
    async fn insert_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let embedding = vec![1.0, 0.0, 0.0];
        store
            .insert(make_chunk("c1", "Hello world", "test"), embedding.clone())
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.db_path(), dir.path().join("rag.db"));

        let results = store.search(&embedding, 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.chunk_id, "c1");
        assert_eq!(
            results[0].chunk.metadata,
            Some(serde_json::json!({ "start_offset": 0 }))
        );
        assert!(results[0].score > 0.99);
    }

    #[tokio::test]
    async fn search_ranks_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        store
            .insert_batch(vec![
                (make_chunk("far", "far", "doc"), vec![0.0, 1.0]),
                (make_chunk("near", "near", "doc"), vec![1.0, 0.1]),
                (make_chunk("mid", "mid", "doc"), vec![0.7, 0.7]),
                (make_chunk("odd", "wrong dim", "doc"), vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn empty_index_returns_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        assert!(store.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_keeps_persisted_chunks() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = test_store(&dir).await;
            store
                .insert(make_chunk("c1", "persisted", "doc"), vec![1.0])
                .await
                .unwrap();
        }

        let store = test_store(&dir).await;
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn embedding_model_change_clears_vectors() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        assert!(!store.ensure_embedding_model("embed-v1").await.unwrap());
        store
            .insert(make_chunk("c1", "data", "doc"), vec![1.0])
            .await
            .unwrap();

        assert!(!store.ensure_embedding_model("embed-v1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);

        assert!(store.ensure_embedding_model("embed-v2").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);

        let model: Option<String> =
            sqlx::query_scalar("SELECT value FROM rag_meta WHERE key = 'embedding_model'")
                .fetch_optional(&store.pool)
                .await
                .unwrap();
        assert_eq!(model.unwrap_or_default(), "embed-v2");
    }

    #[tokio::test]
    async fn delete_by_source_leaves_other_sources() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        store
            .insert_batch(vec![
                (make_chunk("a.md#0", "a0", "a.md"), vec![1.0]),
                (make_chunk("a.md#1", "a1", "a.md"), vec![1.0]),
                (make_chunk("b.md#0", "b0", "b.md"), vec![1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_by_source("a.md").await.unwrap(), 2);
        assert_eq!(store.delete_by_source("missing.md").await.unwrap(), 0);

        let results = store.search(&[1.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.source, "b.md");
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        store
            .insert(make_chunk("c1", "a", "doc"), vec![1.0])
            .await
            .unwrap();
        store
            .insert(make_chunk("c2", "b", "doc"), vec![1.0])
            .await
            .unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
