use serde::{Deserialize, Serialize};

use super::defaults;

/// Typed view of the merged `config.yml` + `secrets.yaml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub chat: ChatSettings,
    pub ingest: IngestSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: defaults::LLM_BASE_URL.to_string(),
            model: defaults::LLM_MODEL.to_string(),
            api_key: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: defaults::LLM_BASE_URL.to_string(),
            model: defaults::EMBEDDING_MODEL.to_string(),
            api_key: None,
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// System instruction for the standalone-question rewrite.
    pub contextualize_prompt: String,
    /// System instruction for answering; must contain `{context}`.
    pub qa_prompt: String,
    /// When false, the first turn of a conversation skips the rewrite call.
    pub rewrite_first_turn: bool,
    /// Most recent turns fed into prompts. `None` means the whole history.
    pub max_history_turns: Option<usize>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            contextualize_prompt: defaults::CONTEXTUALIZE_PROMPT.to_string(),
            qa_prompt: defaults::QA_PROMPT.to_string(),
            rewrite_first_turn: true,
            max_history_turns: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_size: defaults::CHUNK_SIZE,
            chunk_overlap: defaults::CHUNK_OVERLAP,
        }
    }
}
