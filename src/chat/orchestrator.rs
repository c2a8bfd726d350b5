//! Query Orchestrator: runs one question through classification, retrieval,
//! prompt assembly and completion, then records the turn in the active
//! session.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::context::{ContextClassifier, PreviousExchange, PromptAssembler, QuestionKind};
use crate::core::config::Settings;
use crate::core::errors::{QueryError, SessionIoError};
use crate::llm::CompletionClient;
use crate::rag::{RetrievedPassage, Retriever};
use crate::session::{
    export_session, validate_session_id, ConversationTurn, ExportFormat, QueryMethod, Session,
    SessionStore, SessionSummary,
};

/// Answers shorter than this (after trimming) are flagged unsuccessful.
const MIN_SUCCESSFUL_ANSWER_CHARS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub passages: Vec<RetrievedPassage>,
    pub context_flag: bool,
    pub session_id: String,
    pub turn_count: usize,
    pub question_type: QuestionKind,
    pub method: QueryMethod,
    pub success: bool,
    /// False when the turn could not be written to the session store.
    pub persisted: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_name: String,
    pub conversations: usize,
    pub vector_store_ready: bool,
    pub api_ready: bool,
}

/// Collaborators the orchestrator drives.
pub struct OrchestratorDeps {
    pub retriever: Arc<dyn Retriever>,
    pub completion: Arc<dyn CompletionClient>,
    pub store: Arc<dyn SessionStore>,
}

pub struct QueryOrchestrator {
    retriever: Arc<dyn Retriever>,
    completion: Arc<dyn CompletionClient>,
    store: Arc<dyn SessionStore>,
    classifier: ContextClassifier,
    assembler: PromptAssembler,
    top_k: usize,
    previous_passages: usize,
    session_prefix: String,
    session: Session,
}

impl QueryOrchestrator {
    pub fn new(deps: OrchestratorDeps, settings: &Settings, session: Session) -> Self {
        Self {
            retriever: deps.retriever,
            completion: deps.completion,
            store: deps.store,
            classifier: ContextClassifier::from_settings(&settings.classifier),
            assembler: PromptAssembler::new(&settings.retrieval),
            top_k: settings.retrieval.top_k,
            previous_passages: settings.retrieval.previous_passages,
            session_prefix: settings.app.session_prefix.clone(),
            session,
        }
    }

    /// Resumes `session_id` from the store when it exists, otherwise starts
    /// it empty.
    pub fn open_session(store: &dyn SessionStore, session_id: &str) -> Result<Session, SessionIoError> {
        if store.exists(session_id)? {
            let session = store.load(session_id)?;
            tracing::info!(
                "Resumed session {} with {} turns",
                session_id,
                session.turns.len()
            );
            Ok(session)
        } else {
            validate_session_id(session_id)?;
            Ok(Session::new(session_id))
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    pub fn completion_model(&self) -> &str {
        self.completion.model()
    }

    pub async fn query(&mut self, question: &str) -> Result<QueryResult, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let context_flag = self.classifier.is_contextual(question);
        let question_type = self.classifier.question_kind(question);

        let fresh = match self.retriever.search(question, self.top_k).await {
            Ok(passages) => passages,
            Err(err) => {
                tracing::warn!("Retrieval failed, answering without passages: {}", err);
                Vec::new()
            }
        };

        let (prompt, supplementary, used_history) = {
            let previous = if context_flag {
                self.session.last_turn()
            } else {
                None
            };
            let supplementary: Vec<RetrievedPassage> = previous
                .map(|turn| {
                    turn.passages
                        .iter()
                        .take(self.previous_passages)
                        .filter(|p| !fresh.iter().any(|f| same_passage(f, p)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            let exchange = previous.map(|turn| PreviousExchange {
                question: &turn.question,
                answer: &turn.answer,
            });
            let prompt =
                self.assembler
                    .assemble(question, context_flag, exchange, &fresh, &supplementary);
            (prompt, supplementary, previous.is_some())
        };

        tracing::info!(
            session = %self.session.session_id,
            context_reference = context_flag,
            fresh = fresh.len(),
            supplementary = supplementary.len(),
            "Running query"
        );

        let answer = self.completion.complete(&prompt).await?;

        let success = answer.trim().chars().count() > MIN_SUCCESSFUL_ANSWER_CHARS;
        let method = if used_history {
            QueryMethod::ContextualRag
        } else {
            QueryMethod::SearchRag
        };
        let mut passages = fresh;
        passages.extend(supplementary);
        let timestamp = Utc::now();

        self.session.turns.push(ConversationTurn {
            question: question.to_string(),
            answer: answer.clone(),
            passages: passages.clone(),
            context_flag,
            question_type,
            method,
            success,
            timestamp,
        });

        let persisted = match self.store.save(&self.session) {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(
                    "Failed to persist session {}: {}",
                    self.session.session_id,
                    err
                );
                false
            }
        };

        Ok(QueryResult {
            answer,
            passages,
            context_flag,
            session_id: self.session.session_id.clone(),
            turn_count: self.session.turns.len(),
            question_type,
            method,
            success,
            persisted,
            timestamp,
        })
    }

    /// Starts an empty session, saving the current one first when it has
    /// turns. Returns `(old_id, new_id)`.
    ///
    /// A chosen name that is already taken is refused. Generated names get a
    /// numeric suffix until they are free.
    pub fn new_session(&mut self, name: Option<&str>) -> Result<(String, String), SessionIoError> {
        let new_id = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                validate_session_id(name)?;
                if self.is_taken(name)? {
                    return Err(SessionIoError::AlreadyExists(name.to_string()));
                }
                name.to_string()
            }
            None => {
                let base = format!(
                    "{}_{}",
                    self.session_prefix,
                    Local::now().format("%Y%m%d_%H%M%S")
                );
                let mut candidate = base.clone();
                let mut n = 2;
                while self.is_taken(&candidate)? {
                    candidate = format!("{}_{}", base, n);
                    n += 1;
                }
                candidate
            }
        };

        self.persist_if_not_empty();
        let old = std::mem::replace(&mut self.session, Session::new(new_id.clone()));
        tracing::info!("New session {} (previous: {})", new_id, old.session_id);
        Ok((old.session_id, new_id))
    }

    fn is_taken(&self, session_id: &str) -> Result<bool, SessionIoError> {
        Ok(session_id == self.session.session_id || self.store.exists(session_id)?)
    }

    /// Activates a stored session. Loading the active session is a no-op.
    pub fn load_session(&mut self, session_id: &str) -> Result<(), SessionIoError> {
        if session_id == self.session.session_id {
            return Ok(());
        }

        let loaded = self.store.load(session_id)?;
        self.persist_if_not_empty();
        tracing::info!(
            "Loaded session {} with {} turns",
            session_id,
            loaded.turns.len()
        );
        self.session = loaded;
        Ok(())
    }

    pub fn delete_session(&mut self, session_id: &str) -> Result<(), SessionIoError> {
        if session_id == self.session.session_id {
            return Err(SessionIoError::ActiveSession(session_id.to_string()));
        }
        if !self.store.delete(session_id)? {
            return Err(SessionIoError::NotFound(session_id.to_string()));
        }
        tracing::info!("Deleted session {}", session_id);
        Ok(())
    }

    /// Active session first, then every other stored session.
    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        let mut sessions = vec![SessionSummary::current(&self.session)];
        match self.store.list() {
            Ok(stored) => sessions.extend(
                stored
                    .into_iter()
                    .filter(|s| s.session_id != self.session.session_id),
            ),
            Err(err) => tracing::warn!("Failed to list stored sessions: {}", err),
        }
        sessions
    }

    /// Forgets the active session's turns in memory; the stored file is
    /// rewritten on the next saved turn.
    pub fn clear_history(&mut self) {
        self.session.turns.clear();
        tracing::info!("Cleared history of session {}", self.session.session_id);
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.session.turns
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_name: self.session.session_id.clone(),
            conversations: self.session.turns.len(),
            vector_store_ready: self.retriever.is_ready(),
            api_ready: self.completion.is_configured(),
        }
    }

    pub fn export(&self, format: ExportFormat) -> Result<String, SessionIoError> {
        export_session(&self.session, format)
    }

    fn persist_if_not_empty(&self) {
        if self.session.is_empty() {
            return;
        }
        if let Err(err) = self.store.save(&self.session) {
            tracing::error!(
                "Failed to save session {}: {}",
                self.session.session_id,
                err
            );
        }
    }
}

fn same_passage(a: &RetrievedPassage, b: &RetrievedPassage) -> bool {
    a.source_name == b.source_name && a.text == b.text
}
