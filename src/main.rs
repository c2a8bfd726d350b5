use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use ragchat::core::config::AppPaths;
use ragchat::logging::{self, LogTarget};
use ragchat::server;
use ragchat::state::{AppState, InitOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(&AppPaths::new(), LogTarget::Server);

    let state = AppState::initialize(InitOptions::default())
        .await
        .context("Failed to initialize application state")?;

    let bind_addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!(
        "Listening on {} (session {}, {} documents)",
        addr,
        state.chat.session_id().await,
        state.documents_loaded
    );

    let app: Router = server::router::router(state);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
