//! Retrieval-augmented chat over a persisted document index.
//!
//! Each message goes through three steps: the question is rewritten into a
//! standalone query, the query retrieves the five nearest documents, and the
//! model answers the original question with those documents in its prompt.
//! The exchange is then appended to the conversation history.

pub mod chat;
pub mod core;
pub mod history;
pub mod llm;
pub mod rag;
pub mod state;
pub mod vector_math;

pub use chat::{ChainOutput, ChatOptions, ChatOrchestrator, ChatSessions};
pub use crate::core::errors::{Collaborator, RagError};
pub use history::{ConversationHistory, ConversationTurn};
pub use state::AppState;
