//! Vector Index Adapter: chunking, storage and similarity search over the corpus.

pub mod engine;
pub mod index;
pub mod sqlite;
pub mod store;

pub use engine::{ChunkConfig, ChunkEngine, TextChunk};
pub use index::{IndexOutcome, RetrievedPassage, Retriever, VectorIndex};
pub use sqlite::SqliteRagStore;
pub use store::{ChunkSearchResult, RagStore, StoredChunk};
