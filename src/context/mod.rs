pub mod classifier;
pub mod prompt;

pub use classifier::{ContextClassifier, QuestionKind};
pub use prompt::{PreviousExchange, PromptAssembler};
