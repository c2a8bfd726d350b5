use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use ragchat::core::config::{AppPaths, ConfigService, Settings};
use ragchat::core::errors::{CompletionError, RetrievalError};
use ragchat::llm::CompletionClient;
use ragchat::rag::{RetrievedPassage, Retriever};
use ragchat::server::router::router;
use ragchat::session::JsonSessionStore;
use ragchat::state::{AppState, StateParts};

struct StaticRetriever;

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        Ok((0..k.min(3))
            .map(|i| RetrievedPassage {
                text: format!("{} excerpt {}", query, i),
                source_name: format!("guide{}.md", i),
                similarity_score: 0.8 - 0.1 * i as f32,
                metadata: None,
            })
            .collect())
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn chunk_count(&self) -> Result<usize, RetrievalError> {
        Ok(3)
    }

    async fn list_sources(&self, _limit: usize) -> Result<Vec<(String, usize)>, RetrievalError> {
        Ok(vec![("Team Guide.md".to_string(), 3)])
    }
}

/// An index whose backing store is unreachable.
struct BrokenRetriever;

#[async_trait]
impl Retriever for BrokenRetriever {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        Err(RetrievalError::Store("database is locked".to_string()))
    }

    fn is_ready(&self) -> bool {
        false
    }

    async fn chunk_count(&self) -> Result<usize, RetrievalError> {
        Err(RetrievalError::Store("database is locked".to_string()))
    }
}

struct EchoCompletion;

#[async_trait]
impl CompletionClient for EchoCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Ok("Scrum is a lightweight framework for teams.".to_string())
    }

    fn model(&self) -> &str {
        "test-model"
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn test_app(dir: &TempDir) -> Router {
    test_app_with(dir, Arc::new(StaticRetriever))
}

fn test_app_with(dir: &TempDir, retriever: Arc<dyn Retriever>) -> Router {
    let paths = Arc::new(AppPaths::with_dirs(
        dir.path().to_path_buf(),
        dir.path().to_path_buf(),
    ));
    let mut settings = Settings::default();
    settings.llm.api_key = Some("sk-test-secret".to_string());

    let state = AppState::from_parts(StateParts {
        config: ConfigService::new(paths.clone()),
        store: Arc::new(JsonSessionStore::new(paths.sessions_dir.clone())),
        settings,
        retriever,
        completion: Arc::new(EchoCompletion),
        session_id: "web_session".to_string(),
        documents_loaded: 1,
    })
    .expect("state");

    router(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_components() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/api/rag/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["vector_index"], true);
}

#[tokio::test]
async fn query_answers_and_records_turn() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(
        &app,
        "POST",
        "/api/rag/query",
        Some(json!({ "question": "What is Scrum?" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["response"], "Scrum is a lightweight framework for teams.");
    assert_eq!(body["metadata"]["model"], "test-model");
    assert_eq!(body["metadata"]["method"], "search_rag");
    assert_eq!(body["metadata"]["context_reference"], false);
    assert_eq!(body["metadata"]["turn_count"], 1);
    assert_eq!(body["sources"].as_array().map(Vec::len), Some(3));

    let (_, history) = send(&app, "GET", "/api/rag/conversation/history", None).await;
    assert_eq!(history["count"], 1);
    assert!(dir.path().join("sessions").join("web_session.json").exists());
}

#[tokio::test]
async fn query_can_omit_sources() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(
        &app,
        "POST",
        "/api/rag/query",
        Some(json!({ "question": "What is Scrum?", "include_sources": false })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("sources").is_none());
    assert_eq!(body["metadata"]["sources_count"], 3);
}

#[tokio::test]
async fn empty_or_missing_question_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, "POST", "/api/rag/query", Some(json!({ "question": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, "POST", "/api/rag/query", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_active_session_conflicts() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(
        &app,
        "POST",
        "/api/rag/conversation/delete",
        Some(json!({ "session_id": "web_session" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        "POST",
        "/api/rag/conversation/delete",
        Some(json!({ "session_id": "never_saved" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn fresh_store_lists_only_active_session() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, "GET", "/api/rag/conversation/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["sessions"][0]["session_id"], "web_session");
    assert_eq!(body["sessions"][0]["is_current"], true);
    assert_eq!(body["sessions"][0]["turns_count"], 0);
}

#[tokio::test]
async fn new_session_then_load_previous() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    send(&app, "POST", "/api/rag/query", Some(json!({ "question": "What is Scrum?" }))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/rag/conversation/new",
        Some(json!({ "session_name": "second" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["old_session_id"], "web_session");
    assert_eq!(body["new_session_id"], "second");

    let (status, _) = send(
        &app,
        "POST",
        "/api/rag/conversation/load",
        Some(json!({ "session_id": "web_session" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, history) = send(&app, "GET", "/api/rag/conversation/history", None).await;
    assert_eq!(history["count"], 1);
    assert_eq!(history["history"][0]["question"], "What is Scrum?");
}

#[tokio::test]
async fn new_session_with_taken_name_conflicts() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    send(&app, "POST", "/api/rag/query", Some(json!({ "question": "What is Scrum?" }))).await;
    send(
        &app,
        "POST",
        "/api/rag/conversation/new",
        Some(json!({ "session_name": "second" })),
    )
    .await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/rag/conversation/new",
        Some(json!({ "session_name": "web_session" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (_, body) = send(&app, "GET", "/api/rag/conversation/sessions", None).await;
    assert_eq!(body["sessions"][0]["session_id"], "second");
    assert_eq!(body["sessions"][0]["is_current"], true);
}

#[tokio::test]
async fn export_returns_named_transcript() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    send(&app, "POST", "/api/rag/query", Some(json!({ "question": "What is Scrum?" }))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/rag/conversation/export",
        Some(json!({ "format": "json" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["filename"].as_str().unwrap().ends_with(".json"));
    assert!(body["content"].as_str().unwrap().contains("What is Scrum?"));

    let (status, _) = send(
        &app,
        "POST",
        "/api/rag/conversation/export",
        Some(json!({ "format": "pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_validates_and_returns_results() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(
        &app,
        "POST",
        "/api/rag/search",
        Some(json!({ "query": "sprint", "limit": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["source"], "guide0.md");

    let (status, _) = send(&app, "POST", "/api/rag/search", Some(json!({ "query": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stats_redacts_api_key() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = send(&app, "GET", "/api/rag/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statistics"]["index"]["chunks"], 3);
    assert_eq!(body["statistics"]["system_status"]["rag_available"], true);
    assert!(!body.to_string().contains("sk-test-secret"));
}

#[tokio::test]
async fn stats_reports_unavailable_index() {
    let dir = TempDir::new().unwrap();
    let app = test_app_with(&dir, Arc::new(BrokenRetriever));

    let (status, body) = send(&app, "GET", "/api/rag/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["statistics"]["index"]["chunks"].is_null());
    assert_eq!(body["statistics"]["system_status"]["rag_available"], false);
    assert_eq!(body["statistics"]["system_status"]["indexer_available"], false);
}

#[tokio::test]
async fn modules_and_examples_are_listed() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (_, modules) = send(&app, "GET", "/api/rag/modules", None).await;
    assert_eq!(modules["count"], 1);
    assert_eq!(modules["modules"][0]["id"], "team_guide_md");

    let (_, examples) = send(&app, "GET", "/api/rag/questions/examples", None).await;
    assert_eq!(examples["examples"].as_array().map(Vec::len), Some(3));
}
