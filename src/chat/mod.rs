//! Query Orchestrator and its single-writer handle.

pub mod orchestrator;
pub mod service;

pub use orchestrator::{OrchestratorDeps, QueryOrchestrator, QueryResult, SessionInfo};
pub use service::ChatService;
