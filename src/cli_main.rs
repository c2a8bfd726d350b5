use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use ragchat::cli;
use ragchat::core::config::AppPaths;
use ragchat::logging::{self, LogTarget};
use ragchat::state::{AppState, InitOptions, SessionSelection};

/// Interactive question answering over the document corpus.
#[derive(Debug, Parser)]
#[command(name = "ragchat", version)]
struct Args {
    /// Session to resume or create; a timestamped one is generated when omitted.
    #[arg(short, long)]
    session: Option<String>,

    /// Path to config.yml.
    #[arg(short, long, env = "RAGCHAT_CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(&AppPaths::new(), LogTarget::Cli);

    let session = match args.session {
        Some(name) => SessionSelection::Named(name),
        None => SessionSelection::Generated,
    };
    let state = AppState::initialize(InitOptions {
        config_path: args.config,
        session,
    })
    .await
    .context("Failed to initialize application state")?;

    cli::run(state).await
}
