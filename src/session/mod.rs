//! Session data model, JSON persistence and transcript export.

pub mod export;
pub mod model;
pub mod store;

pub use export::{export_file_name, export_session, ExportFormat};
pub use model::{ConversationTurn, QueryMethod, Session, SessionFile, SessionSummary};
pub use store::{validate_session_id, JsonSessionStore, SessionStore};
