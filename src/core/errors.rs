use std::path::PathBuf;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "success": false,
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));
        (status, body).into_response()
    }
}

/// Failures of the embedding + similarity-search path.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding request failed: {0}")]
    Embedding(String),
    #[error("vector store error: {0}")]
    Store(String),
    #[error("vector index has not been built")]
    NotIndexed,
}

impl RetrievalError {
    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RetrievalError::Store(err.to_string())
    }
}

/// Failures of the language-model completion endpoint.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no API key configured for the completion endpoint")]
    MissingApiKey,
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        CompletionError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SessionIoError {
    #[error("invalid session id '{0}'")]
    InvalidId(String),
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error("session '{0}' is the active session")]
    ActiveSession(String),
    #[error("session '{0}' already exists")]
    AlreadyExists(String),
    #[error("session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionIoError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SessionIoError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("question is empty")]
    EmptyQuestion,
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::NotIndexed => ApiError::ServiceUnavailable(err.to_string()),
            RetrievalError::Embedding(_) => ApiError::BadGateway(err.to_string()),
            RetrievalError::Store(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CompletionError> for ApiError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::MissingApiKey => ApiError::ServiceUnavailable(err.to_string()),
            _ => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<SessionIoError> for ApiError {
    fn from(err: SessionIoError) -> Self {
        match err {
            SessionIoError::InvalidId(_) => ApiError::BadRequest(err.to_string()),
            SessionIoError::NotFound(_) => ApiError::NotFound(err.to_string()),
            SessionIoError::ActiveSession(_) | SessionIoError::AlreadyExists(_) => {
                ApiError::Conflict(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::EmptyQuestion => ApiError::BadRequest(err.to_string()),
            QueryError::Completion(inner) => inner.into(),
        }
    }
}
