//! Storage backend for embedded corpus chunks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::RetrievalError;

/// A stored chunk with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    pub chunk_id: String,
    pub content: String,
    /// Document file name.
    pub source: String,
    pub metadata: Option<serde_json::Value>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

/// Abstract trait for RAG storage backends.
#[async_trait]
pub trait RagStore: Send + Sync {
    /// Insert (or replace by id) multiple chunks in one transaction.
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>)
        -> Result<(), RetrievalError>;

    /// The `limit` chunks most similar to the query embedding, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, RetrievalError>;

    async fn count(&self) -> Result<usize, RetrievalError>;

    /// `(source, chunk_count)` pairs, largest first.
    async fn list_sources(&self, limit: usize) -> Result<Vec<(String, usize)>, RetrievalError>;

    /// Drop every chunk and record the model the next vectors come from.
    async fn reindex_with_model(&self, embedding_model: &str) -> Result<(), RetrievalError>;

    /// Embedding model recorded by the last reindex, if any.
    async fn embedding_model(&self) -> Result<Option<String>, RetrievalError>;
}
