use std::fmt;

use thiserror::Error;

/// External services the chat pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Embedder,
    VectorIndex,
    LanguageModel,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collaborator::Embedder => "embedding service",
            Collaborator::VectorIndex => "vector index",
            Collaborator::LanguageModel => "language model",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: Collaborator,
        message: String,
    },
    #[error("malformed history: {0}")]
    MalformedHistory(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn internal<E: fmt::Display>(err: E) -> Self {
        RagError::Internal(err.to_string())
    }

    pub fn unavailable<E: fmt::Display>(collaborator: Collaborator, err: E) -> Self {
        RagError::CollaboratorUnavailable {
            collaborator,
            message: err.to_string(),
        }
    }

    pub fn model<E: fmt::Display>(err: E) -> Self {
        Self::unavailable(Collaborator::LanguageModel, err)
    }

    pub fn embedder<E: fmt::Display>(err: E) -> Self {
        Self::unavailable(Collaborator::Embedder, err)
    }

    pub fn index<E: fmt::Display>(err: E) -> Self {
        Self::unavailable(Collaborator::VectorIndex, err)
    }

    /// Which collaborator failed, if this error came from one.
    pub fn collaborator(&self) -> Option<Collaborator> {
        match self {
            RagError::CollaboratorUnavailable { collaborator, .. } => Some(*collaborator),
            _ => None,
        }
    }
}
