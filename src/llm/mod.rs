pub mod completion;
pub mod openai;
pub mod provider;
pub mod types;

pub use completion::{CompletionClient, LlmCompletionClient};
pub use openai::OpenAiCompatibleProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
