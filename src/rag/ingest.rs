//! Out-of-band ingestion: split text into overlapping chunks, embed them and
//! write them to the vector index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::store::{RagStore, StoredChunk};
use crate::core::config::IngestSettings;
use crate::core::errors::RagError;
use crate::llm::EmbeddingProvider;

const INGEST_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];
const SENTENCE_ENDINGS: [&str; 6] = [". ", "! ", "? ", ".\n", "!\n", "?\n"];

/// A text chunk with source information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    /// Source identifier (file name, URL, ...)
    pub source: String,
    /// Character offset in the original document
    pub start_offset: usize,
    pub chunk_index: usize,
}

impl TextChunk {
    /// Stable per (source, index) so re-ingesting a document overwrites it.
    pub fn chunk_id(&self) -> String {
        format!("{}#{}", self.source, self.chunk_index)
    }
}

pub struct Ingestor {
    settings: IngestSettings,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn RagStore>,
}

impl Ingestor {
    pub fn new(
        settings: IngestSettings,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn RagStore>,
    ) -> Self {
        Self {
            settings,
            embedder,
            store,
        }
    }

    /// Replaces everything stored for `source` with the chunks of `text`.
    /// Returns the number of chunks written.
    pub async fn ingest_text(&self, text: &str, source: &str) -> Result<usize, RagError> {
        let chunks = self.split_into_chunks(text, source);
        if chunks.is_empty() {
            let removed = self.store.delete_by_source(source).await?;
            if removed > 0 {
                tracing::info!("Removed {} stale chunks from empty {}", removed, source);
            }
            return Ok(0);
        }

        let inputs: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&inputs).await?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::embedder(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let items: Vec<(StoredChunk, Vec<f32>)> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let stored = StoredChunk {
                    chunk_id: chunk.chunk_id(),
                    content: chunk.text,
                    source: chunk.source,
                    metadata: Some(serde_json::json!({
                        "start_offset": chunk.start_offset,
                        "chunk_index": chunk.chunk_index,
                    })),
                };
                (stored, embedding)
            })
            .collect();

        let written = items.len();
        let replaced = self.store.delete_by_source(source).await?;
        self.store.insert_batch(items).await?;
        tracing::info!(
            "Ingested {} chunks from {} (replaced {})",
            written,
            source,
            replaced
        );
        Ok(written)
    }

    /// Ingests every `.txt`/`.md` file below `dir`. Files are processed in
    /// path order; the file name relative to `dir` becomes the source.
    pub async fn ingest_directory(&self, dir: &Path) -> anyhow::Result<usize> {
        let files = collect_files(dir).await?;
        let mut total = 0;

        for path in files {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let source = path
                .strip_prefix(dir)
                .unwrap_or(path.as_path())
                .to_string_lossy()
                .replace('\\', "/");
            total += self
                .ingest_text(&text, &source)
                .await
                .with_context(|| format!("Failed to ingest {}", path.display()))?;
        }

        Ok(total)
    }

    /// Split text into overlapping chunks. Each chunk after the first starts
    /// `chunk_overlap` characters before the previous chunk's cut.
    pub fn split_into_chunks(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chunk_size = self.settings.chunk_size.max(1);
        let overlap = self.settings.chunk_overlap;

        let mut chunks = Vec::new();
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let mut start = 0;

        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let chunk_text: String = chars[start..end].iter().collect();

            // Try to break at sentence boundary
            let final_text = if end < total_chars {
                find_sentence_boundary(&chunk_text)
            } else {
                chunk_text.as_str()
            };
            let cut_chars = final_text.chars().count();

            let trimmed = final_text.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    source: source.to_string(),
                    start_offset: start,
                    chunk_index: chunks.len(),
                });
            }

            if end == total_chars {
                break;
            }
            start += cut_chars.saturating_sub(overlap).max(1);
        }

        chunks
    }
}

async fn collect_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut pending = vec![dir.to_path_buf()];
    let mut files = Vec::new();

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .with_context(|| format!("Failed to list {}", current.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if has_ingest_extension(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn has_ingest_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| INGEST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Cut at the last sentence ending within the final 20% of the chunk.
fn find_sentence_boundary(text: &str) -> &str {
    let char_count = text.chars().count();
    let search_start = text
        .char_indices()
        .nth((char_count * 80) / 100)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let search_text = &text[search_start..];

    for ending in SENTENCE_ENDINGS.iter() {
        if let Some(pos) = search_text.rfind(ending) {
            let cut_pos = search_start + pos + ending.len();
            return &text[..cut_pos];
        }
    }

    text
}
