use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::{CompletionError, RetrievalError};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// return the provider name (e.g. "codestral", "lmstudio")
    fn name(&self) -> &str;

    /// check if the provider is reachable
    async fn health_check(&self) -> bool;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, CompletionError>;

    /// generate one embedding per input, in input order
    async fn embed(&self, inputs: &[String], model_id: &str)
        -> Result<Vec<Vec<f32>>, RetrievalError>;
}
