use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: usize = 10;
const MAX_SEARCH_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: Option<String>,
    #[serde(default = "default_include_sources")]
    pub include_sources: bool,
}

fn default_include_sources() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let question = payload
        .question
        .ok_or_else(|| ApiError::BadRequest("Missing question".to_string()))?;

    let result = state.chat.query(&question).await?;

    let mut body = json!({
        "success": true,
        "question": question.trim(),
        "response": result.answer,
        "metadata": {
            "sources_count": result.passages.len(),
            "model": state.completion.model(),
            "timestamp": result.timestamp.to_rfc3339(),
            "method": result.method,
            "context_reference": result.context_flag,
            "question_type": result.question_type,
            "answer_success": result.success,
            "persisted": result.persisted,
            "session_id": result.session_id,
            "turn_count": result.turn_count,
        }
    });
    if payload.include_sources {
        body["sources"] = json!(result.passages);
    }
    Ok(Json(body))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = payload
        .query
        .ok_or_else(|| ApiError::BadRequest("Missing search query".to_string()))?;
    let query = query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Search query is empty".to_string()));
    }
    let limit = payload
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let results = state.retriever.search(query, limit).await?;

    Ok(Json(json!({
        "success": true,
        "query": query,
        "count": results.len(),
        "results": results,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
