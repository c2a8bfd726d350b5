pub mod chat;
pub mod cli;
pub mod context;
pub mod core;
pub mod corpus;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod server;
pub mod session;
pub mod state;
