//! Fakes for the collaborator traits shared by the chat tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::errors::RagError;
use crate::llm::{ChatRequest, EmbeddingProvider, LlmProvider};
use crate::rag::{ChunkSearchResult, Document, RagStore, StoredChunk};
use crate::vector_math::rank_descending_by_cosine;

/// Replays canned replies in order and records every request. Once the
/// script runs out it answers `"answer <n>"`.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
    fail_after: Option<usize>,
}

impl ScriptedLlm {
    pub fn replying<const N: usize>(replies: [&str; N]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
            fail_after: None,
        }
    }

    pub fn failing() -> Self {
        Self::failing_after(0)
    }

    /// Succeeds for the first `calls` requests, then fails.
    pub fn failing_after(calls: usize) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fail_after: Some(calls),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, RagError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        if matches!(self.fail_after, Some(limit) if call > limit) {
            return Err(RagError::model("scripted outage"));
        }

        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("answer {}", call)))
    }
}

/// Counts keyword hits per dimension, so texts sharing a keyword are close.
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn forget_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect();
        // Bias term keeps keyword-free texts away from the zero vector
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.lock().unwrap().extend(inputs.iter().cloned());
        Ok(inputs.iter().map(|text| self.vectorize(text)).collect())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Vec<(StoredChunk, Vec<f32>)>>,
}

#[async_trait]
impl RagStore for MemoryStore {
    async fn insert(&self, chunk: StoredChunk, embedding: Vec<f32>) -> Result<(), RagError> {
        self.items.lock().unwrap().push((chunk, embedding));
        Ok(())
    }

    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), RagError> {
        self.items.lock().unwrap().extend(items);
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, RagError> {
        let items = self.items.lock().unwrap();
        let embeddings: Vec<Vec<f32>> = items.iter().map(|(_, e)| e.clone()).collect();
        let ranked = rank_descending_by_cosine(query_embedding, &embeddings)?;
        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(idx, score)| ChunkSearchResult {
                chunk: items[idx].0.clone(),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, RagError> {
        Ok(self.items.lock().unwrap().len())
    }

    async fn delete_by_source(&self, source: &str) -> Result<usize, RagError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|(chunk, _)| chunk.source != source);
        Ok(before - items.len())
    }

    async fn clear(&self) -> Result<usize, RagError> {
        let mut items = self.items.lock().unwrap();
        let removed = items.len();
        items.clear();
        Ok(removed)
    }
}

pub fn document(text: &str, score: f32) -> Document {
    Document {
        page_content: text.to_string(),
        source: "test".to_string(),
        chunk_id: text.to_string(),
        score,
        metadata: None,
    }
}

pub fn chunk(id: &str, text: &str) -> StoredChunk {
    StoredChunk {
        chunk_id: id.to_string(),
        content: text.to_string(),
        source: "test".to_string(),
        metadata: None,
    }
}
