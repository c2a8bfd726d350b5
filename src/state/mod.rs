use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::chat::{ChatService, OrchestratorDeps, QueryOrchestrator};
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::corpus::CorpusLoader;
use crate::llm::{CompletionClient, LlmCompletionClient, LlmProvider, OpenAiCompatibleProvider};
use crate::rag::{ChunkConfig, ChunkEngine, Retriever, SqliteRagStore, VectorIndex};
use crate::session::{JsonSessionStore, SessionStore};

pub mod error;

use error::InitializationError;

/// Which session the orchestrator starts on.
#[derive(Debug, Clone, Default)]
pub enum SessionSelection {
    /// `server.session_name`, resumed when its file exists.
    #[default]
    Configured,
    /// Resumed when it exists, otherwise created.
    Named(String),
    /// `<app.session_prefix>_<YYYYmmdd_HHMMSS>`
    Generated,
}

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub config_path: Option<PathBuf>,
    pub session: SessionSelection,
}

/// Application state shared by the HTTP handlers and the REPL.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub chat: ChatService,
    pub retriever: Arc<dyn Retriever>,
    pub completion: Arc<dyn CompletionClient>,
    pub documents_loaded: usize,
    pub started_at: DateTime<Utc>,
}

/// Pre-built collaborators, for wiring the state without touching disk or
/// network.
pub struct StateParts {
    pub config: ConfigService,
    pub settings: Settings,
    pub retriever: Arc<dyn Retriever>,
    pub completion: Arc<dyn CompletionClient>,
    pub store: Arc<dyn SessionStore>,
    pub session_id: String,
    pub documents_loaded: usize,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// 1. Resolve paths and load `config.yml` + `secrets.yaml`
    /// 2. Load the corpus and build (or reuse) the vector index
    /// 3. Build the completion client
    /// 4. Open the starting session and wrap the orchestrator
    ///
    /// An unreachable embedding endpoint is not fatal: the index stays
    /// unready and queries are answered without passages.
    pub async fn initialize(options: InitOptions) -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let mut config = ConfigService::new(paths.clone());
        if let Some(path) = options.config_path {
            config = config.with_config_path(path);
        }
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let corpus_root = paths.resolve(&settings.corpus.dir);
        let documents =
            CorpusLoader::new(corpus_root, settings.corpus.documents_subdir.clone()).load();

        let rag_store = SqliteRagStore::new(paths.as_ref())
            .await
            .map_err(|e| InitializationError::Index(e.into()))?;
        let embedder = OpenAiCompatibleProvider::new(
            "embeddings",
            &settings.embedding.base_url,
            settings.embedding.api_key.clone(),
            Duration::from_secs(settings.embedding.timeout_secs),
        )
        .map_err(|e| InitializationError::Llm(e.into()))?;
        if !embedder.health_check().await {
            tracing::warn!(
                "{} endpoint {} is not responding",
                embedder.name(),
                settings.embedding.base_url
            );
        }
        let index = VectorIndex::new(
            Arc::new(rag_store),
            Arc::new(embedder),
            settings.embedding.model.clone(),
            settings.embedding.batch_size,
        );
        let engine = ChunkEngine::new(ChunkConfig {
            chunk_size: settings.corpus.chunk_size,
            chunk_overlap: settings.corpus.chunk_overlap,
        });
        match index.ensure_indexed(&documents, &engine).await {
            Ok(outcome) => tracing::info!(?outcome, "Vector index ready"),
            Err(err) => {
                tracing::error!("Vector index unavailable, continuing without retrieval: {}", err)
            }
        }

        let provider = OpenAiCompatibleProvider::new(
            "completion",
            &settings.llm.base_url,
            settings.llm.api_key.clone(),
            Duration::from_secs(settings.llm.timeout_secs),
        )
        .map_err(|e| InitializationError::Llm(e.into()))?;
        let completion = LlmCompletionClient::new(Arc::new(provider), settings.llm.clone());
        if !completion.is_configured() {
            tracing::warn!(
                "No API key for {}; set llm.api_key or RAGCHAT_API_KEY",
                settings.llm.base_url
            );
        }

        let session_id = match options.session {
            SessionSelection::Configured => settings.server.session_name.clone(),
            SessionSelection::Named(name) => name,
            SessionSelection::Generated => format!(
                "{}_{}",
                settings.app.session_prefix,
                Local::now().format("%Y%m%d_%H%M%S")
            ),
        };

        let parts = StateParts {
            store: Arc::new(JsonSessionStore::new(paths.sessions_dir.clone())),
            config,
            settings,
            retriever: Arc::new(index),
            completion: Arc::new(completion),
            session_id,
            documents_loaded: documents.len(),
        };
        Self::from_parts(parts).map(Arc::new)
    }

    pub fn from_parts(parts: StateParts) -> Result<Self, InitializationError> {
        let session = QueryOrchestrator::open_session(parts.store.as_ref(), &parts.session_id)
            .map_err(|e| InitializationError::Session(e.into()))?;

        let orchestrator = QueryOrchestrator::new(
            OrchestratorDeps {
                retriever: parts.retriever.clone(),
                completion: parts.completion.clone(),
                store: parts.store,
            },
            &parts.settings,
            session,
        );

        Ok(AppState {
            config: parts.config,
            settings: Arc::new(parts.settings),
            chat: ChatService::new(orchestrator),
            retriever: parts.retriever,
            completion: parts.completion,
            documents_loaded: parts.documents_loaded,
            started_at: Utc::now(),
        })
    }
}
