use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::session::{export_file_name, ExportFormat};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewSessionRequest {
    pub session_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionIdRequest {
    pub session_id: Option<String>,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn required_session_id(payload: SessionIdRequest) -> Result<String, ApiError> {
    payload
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing session_id".to_string()))
}

pub async fn history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let history = state.chat.history().await;
    Json(json!({
        "success": true,
        "count": history.len(),
        "history": history,
        "timestamp": now(),
    }))
}

pub async fn clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.chat.clear_history().await;
    Json(json!({
        "success": true,
        "message": "Conversation history cleared",
        "timestamp": now(),
    }))
}

pub async fn export(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ExportRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let format = match payload.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>().map_err(ApiError::BadRequest)?,
        None => ExportFormat::Text,
    };

    let (session_id, content) = state.chat.export(format).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Conversation exported",
        "filename": export_file_name(&session_id, format),
        "content": content,
        "timestamp": now(),
    })))
}

pub async fn new_session(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<NewSessionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let (old_session_id, new_session_id) = state
        .chat
        .new_session(payload.session_name.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "New conversation started",
        "old_session_id": old_session_id,
        "new_session_id": new_session_id,
        "timestamp": now(),
    })))
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sessions = state.chat.list_sessions().await;
    Json(json!({
        "success": true,
        "count": sessions.len(),
        "sessions": sessions,
        "timestamp": now(),
    }))
}

pub async fn load_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = required_session_id(payload)?;
    state.chat.load_session(&session_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Session {} loaded", session_id),
        "session_id": session_id,
        "timestamp": now(),
    })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SessionIdRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = required_session_id(payload)?;
    state.chat.delete_session(&session_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Session {} deleted", session_id),
        "timestamp": now(),
    })))
}
