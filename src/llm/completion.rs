use std::sync::Arc;

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};
use crate::core::config::settings::LlmSettings;
use crate::core::errors::CompletionError;

/// Turns an assembled prompt into answer text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    /// Model name reported in query metadata.
    fn model(&self) -> &str;

    /// Whether a request could be sent at all (credentials present).
    fn is_configured(&self) -> bool;
}

/// Single-message completion over an [`LlmProvider`].
pub struct LlmCompletionClient {
    provider: Arc<dyn LlmProvider>,
    settings: LlmSettings,
}

impl LlmCompletionClient {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmSettings) -> Self {
        Self { provider, settings }
    }

    fn has_api_key(&self) -> bool {
        self.settings
            .api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        if !self.is_configured() {
            return Err(CompletionError::MissingApiKey);
        }

        let request =
            ChatRequest::new(vec![ChatMessage::user(prompt)]).with_settings(&self.settings);

        tracing::debug!(
            provider = self.provider.name(),
            model = %self.settings.model,
            prompt_chars = prompt.len(),
            "Sending completion request"
        );
        self.provider.chat(request, &self.settings.model).await
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn is_configured(&self) -> bool {
        !self.settings.require_api_key || self.has_api_key()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::core::errors::RetrievalError;

    #[derive(Default)]
    struct RecordingProvider {
        requests: Mutex<Vec<(ChatRequest, String)>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn health_check(&self) -> bool {
            true
        }

        async fn chat(
            &self,
            request: ChatRequest,
            model_id: &str,
        ) -> Result<String, CompletionError> {
            self.requests
                .lock()
                .unwrap()
                .push((request, model_id.to_string()));
            Ok("answer".to_string())
        }

        async fn embed(
            &self,
            _inputs: &[String],
            _model_id: &str,
        ) -> Result<Vec<Vec<f32>>, RetrievalError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn sends_single_user_message_with_settings() {
        let provider = Arc::new(RecordingProvider::default());
        let settings = LlmSettings {
            api_key: Some("key".to_string()),
            ..LlmSettings::default()
        };
        let client = LlmCompletionClient::new(provider.clone(), settings);

        let answer = client.complete("Question: hi\n\nAnswer:").await.unwrap();

        assert_eq!(answer, "answer");
        let requests = provider.requests.lock().unwrap();
        let (request, model) = &requests[0];
        assert_eq!(model, "codestral-latest");
        assert_eq!(
            request.messages,
            vec![ChatMessage::user("Question: hi\n\nAnswer:")]
        );
        assert_eq!(request.max_tokens, Some(2000));
        assert_eq!(request.temperature, Some(0.1));
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_provider() {
        let provider = Arc::new(RecordingProvider::default());
        let client = LlmCompletionClient::new(provider.clone(), LlmSettings::default());

        assert!(!client.is_configured());
        assert!(matches!(
            client.complete("prompt").await,
            Err(CompletionError::MissingApiKey)
        ));
        assert!(provider.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn keyless_endpoint_allowed_when_not_required() {
        let provider = Arc::new(RecordingProvider::default());
        let settings = LlmSettings {
            require_api_key: false,
            ..LlmSettings::default()
        };
        let client = LlmCompletionClient::new(provider, settings);

        assert!(client.complete("prompt").await.is_ok());
    }
}
