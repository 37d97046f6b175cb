use std::sync::Arc;

use crate::chat::{ChatOrchestrator, ChatSessions};
use crate::core::config::{AppPaths, ConfigService, RagSettings};
use crate::core::logging;
use crate::llm::OpenAiCompatProvider;
use crate::rag::{Ingestor, SqliteRagStore};

pub mod error;

use error::InitializationError;

/// Everything a host application needs to serve chat requests.
///
/// Contains references to:
/// - Configuration and paths
/// - The persisted vector index
/// - The chat pipeline and per-conversation sessions
/// - The ingestor that fills the index
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<RagSettings>,
    pub rag_store: Arc<SqliteRagStore>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub sessions: ChatSessions,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    /// Initializes the application state from the environment.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        Self::initialize_with(AppPaths::new()).await
    }

    /// This process includes:
    /// 1. Loading configuration and secrets
    /// 2. Starting the log subscriber
    /// 3. Opening the vector index, clearing it if the embedding model changed
    /// 4. Building the model providers and the chat pipeline
    pub async fn initialize_with(paths: AppPaths) -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(paths);
        let config = ConfigService::new(paths.clone());
        let settings = Arc::new(
            config
                .load_settings()
                .map_err(|e| InitializationError::Config(e.into()))?,
        );

        logging::init(&paths);

        let rag_store = Arc::new(
            SqliteRagStore::open(&paths.persist_dir)
                .await
                .map_err(|e| InitializationError::Rag(e.into()))?,
        );
        if rag_store
            .ensure_embedding_model(&settings.embedding.model)
            .await
            .map_err(|e| InitializationError::Rag(e.into()))?
        {
            tracing::info!("Vector index must be re-ingested for {}", settings.embedding.model);
        }

        let llm = Arc::new(
            OpenAiCompatProvider::for_chat(&settings.llm)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );
        let embedder = Arc::new(
            OpenAiCompatProvider::for_embeddings(&settings.embedding)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let orchestrator = Arc::new(ChatOrchestrator::from_settings(
            &settings,
            llm,
            embedder.clone(),
            rag_store.clone(),
        ));
        let sessions = ChatSessions::new(orchestrator.clone());
        let ingestor = Arc::new(Ingestor::new(
            settings.ingest.clone(),
            embedder,
            rag_store.clone(),
        ));

        tracing::info!(
            model = %settings.llm.model,
            embedding_model = %settings.embedding.model,
            index = %rag_store.db_path().display(),
            "RAG chat initialized"
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            rag_store,
            orchestrator,
            sessions,
            ingestor,
        }))
    }
}
