//! Document Loader for the on-disk corpus.

mod loader;

pub use loader::{CorpusDocument, CorpusLoader, DocumentMetadata, DocumentType};
