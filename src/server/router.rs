use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{conversation, corpus, health, query};
use crate::state::AppState;

/// Creates the application router.
///
/// `/health` sits at the root; everything else lives under `/api/rag`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/query", post(query::query))
        .route("/search", post(query::search))
        .route("/conversation/history", get(conversation::history))
        .route("/conversation/clear", post(conversation::clear))
        .route("/conversation/export", post(conversation::export))
        .route("/conversation/new", post(conversation::new_session))
        .route("/conversation/sessions", get(conversation::list_sessions))
        .route("/conversation/load", post(conversation::load_session))
        .route("/conversation/delete", post(conversation::delete_session))
        .route("/stats", get(corpus::stats))
        .route("/modules", get(corpus::modules))
        .route("/questions/examples", get(corpus::example_questions));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/rag", api)
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let allowed_origins = resolve_allowed_origins(configured)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn resolve_allowed_origins(configured: &[String]) -> Vec<String> {
    let origins = configured
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins();
    }

    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_origins_fall_back_to_local_defaults() {
        let origins = resolve_allowed_origins(&["  ".to_string()]);
        assert!(origins.contains(&"http://localhost:5000".to_string()));
    }

    #[test]
    fn configured_origins_are_trimmed() {
        let origins = resolve_allowed_origins(&[" https://docs.example.com ".to_string()]);
        assert_eq!(origins, vec!["https://docs.example.com".to_string()]);
    }
}
