use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

const MODULE_LIMIT: usize = 20;

const EXAMPLE_QUESTIONS: &[(&str, [&str; 3])] = &[
    (
        "Getting started",
        [
            "What topics does the documentation cover?",
            "Where should a new team member start?",
            "What are the key concepts I need to know?",
        ],
    ),
    (
        "Processes",
        [
            "How do I set up a new project?",
            "What are the steps of the review process?",
            "How is a release prepared?",
        ],
    ),
    (
        "Follow-up",
        [
            "Can you give me an example?",
            "Can you explain that in more detail?",
            "What are the advantages of this approach?",
        ],
    ),
];

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let info = state.chat.info().await;
    let history = state.chat.history().await;
    let chunks = match state.retriever.chunk_count().await {
        Ok(count) => Some(count),
        Err(err) => {
            tracing::warn!("Could not count indexed chunks: {}", err);
            None
        }
    };
    // Answers are grounded only when both the index and the completion API work.
    let rag_available = info.vector_store_ready && info.api_ready && chunks.is_some();

    let settings = serde_json::to_value(state.settings.as_ref()).map_err(ApiError::internal)?;
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds();

    Ok(Json(json!({
        "success": true,
        "statistics": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "uptime_seconds": uptime,
            "system_status": {
                "rag_available": rag_available,
                "indexer_available": info.vector_store_ready,
            },
            "index": {
                "vector_store_ready": info.vector_store_ready,
                "api_ready": info.api_ready,
                "documents_loaded": state.documents_loaded,
                "chunks": chunks,
                "embedding_model": state.settings.embedding.model,
            },
            "conversation": {
                "session_id": info.session_name,
                "total_interactions": info.conversations,
                "successful_interactions": history.iter().filter(|t| t.success).count(),
                "contextual_interactions": history.iter().filter(|t| t.context_flag).count(),
            },
            "config": state.config.redact_sensitive_values(&settings),
        }
    })))
}

pub async fn modules(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let sources = state.retriever.list_sources(MODULE_LIMIT).await?;
    let modules: Vec<Value> = sources
        .iter()
        .map(|(filename, count)| module_entry(filename, *count))
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": modules.len(),
        "modules": modules,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

pub async fn example_questions() -> impl IntoResponse {
    let examples: Vec<Value> = EXAMPLE_QUESTIONS
        .iter()
        .map(|(category, questions)| json!({ "category": category, "questions": questions }))
        .collect();

    Json(json!({
        "success": true,
        "examples": examples,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

fn module_entry(filename: &str, document_count: usize) -> Value {
    let id = filename.to_lowercase().replace([' ', '.'], "_");
    let name = filename
        .strip_suffix(".md")
        .or_else(|| filename.strip_suffix(".txt"))
        .unwrap_or(filename);
    json!({
        "id": id,
        "name": name,
        "description": format!("Document: {}", filename),
        "document_count": document_count,
    })
}
