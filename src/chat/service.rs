use std::sync::Arc;

use tokio::sync::Mutex;

use super::orchestrator::{QueryOrchestrator, QueryResult, SessionInfo};
use crate::core::errors::{QueryError, SessionIoError};
use crate::session::{ConversationTurn, ExportFormat, SessionSummary};

/// Cloneable handle to the one orchestrator of the process.
///
/// Every operation takes the lock for its whole duration, so concurrent
/// callers are serialized instead of interleaving on the active session.
#[derive(Clone)]
pub struct ChatService {
    inner: Arc<Mutex<QueryOrchestrator>>,
}

impl ChatService {
    pub fn new(orchestrator: QueryOrchestrator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
        }
    }

    pub async fn query(&self, question: &str) -> Result<QueryResult, QueryError> {
        self.inner.lock().await.query(question).await
    }

    pub async fn session_id(&self) -> String {
        self.inner.lock().await.session_id().to_string()
    }

    pub async fn new_session(
        &self,
        name: Option<&str>,
    ) -> Result<(String, String), SessionIoError> {
        self.inner.lock().await.new_session(name)
    }

    pub async fn load_session(&self, session_id: &str) -> Result<(), SessionIoError> {
        self.inner.lock().await.load_session(session_id)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), SessionIoError> {
        self.inner.lock().await.delete_session(session_id)
    }

    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.inner.lock().await.list_sessions()
    }

    pub async fn clear_history(&self) {
        self.inner.lock().await.clear_history()
    }

    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.inner.lock().await.history().to_vec()
    }

    pub async fn info(&self) -> SessionInfo {
        self.inner.lock().await.info()
    }

    /// `(session_id, rendered transcript)`
    pub async fn export(&self, format: ExportFormat) -> Result<(String, String), SessionIoError> {
        let orchestrator = self.inner.lock().await;
        let content = orchestrator.export(format)?;
        Ok((orchestrator.session_id().to_string(), content))
    }

    pub async fn completion_model(&self) -> String {
        self.inner.lock().await.completion_model().to_string()
    }
}
