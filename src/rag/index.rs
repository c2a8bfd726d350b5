//! Vector Index Adapter: embeds the corpus at startup and answers
//! similarity queries with corpus passages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::engine::{ChunkEngine, TextChunk};
use super::store::{ChunkSearchResult, RagStore, StoredChunk};
use crate::core::errors::RetrievalError;
use crate::corpus::CorpusDocument;
use crate::llm::LlmProvider;

/// A corpus passage returned by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    #[serde(rename = "content")]
    pub text: String,
    #[serde(rename = "source")]
    pub source_name: String,
    #[serde(rename = "similarity")]
    pub similarity_score: f32,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Similarity search over the corpus.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError>;

    fn is_ready(&self) -> bool;

    async fn chunk_count(&self) -> Result<usize, RetrievalError> {
        Ok(0)
    }

    /// `(filename, chunk_count)` pairs, largest first.
    async fn list_sources(&self, _limit: usize) -> Result<Vec<(String, usize)>, RetrievalError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Store already held vectors from the configured model.
    Reused { chunks: usize },
    Rebuilt { chunks: usize },
}

pub struct VectorIndex {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn LlmProvider>,
    embedding_model: String,
    batch_size: usize,
    ready: AtomicBool,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn RagStore>,
        embedder: Arc<dyn LlmProvider>,
        embedding_model: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            embedding_model: embedding_model.into(),
            batch_size: batch_size.max(1),
            ready: AtomicBool::new(false),
        }
    }

    /// Reuses the stored index when it was built with the configured model,
    /// otherwise clears it and embeds every chunk of `documents`.
    pub async fn ensure_indexed(
        &self,
        documents: &[CorpusDocument],
        engine: &ChunkEngine,
    ) -> Result<IndexOutcome, RetrievalError> {
        let existing = self.store.count().await?;
        let stored_model = self.store.embedding_model().await?;

        if existing > 0 && stored_model.as_deref() == Some(self.embedding_model.as_str()) {
            tracing::info!("Reusing vector index with {} chunks", existing);
            self.ready.store(true, Ordering::SeqCst);
            return Ok(IndexOutcome::Reused { chunks: existing });
        }

        if existing > 0 {
            tracing::info!(
                "Embedding model changed ({:?} -> {}), rebuilding index",
                stored_model,
                self.embedding_model
            );
        }
        self.store.reindex_with_model(&self.embedding_model).await?;

        let chunks = engine.split_documents(documents);
        let total = chunks.len();
        for batch in chunks.chunks(self.batch_size) {
            self.index_batch(batch).await?;
        }

        tracing::info!(
            "Indexed {} chunks from {} documents",
            total,
            documents.len()
        );
        self.ready.store(true, Ordering::SeqCst);
        Ok(IndexOutcome::Rebuilt { chunks: total })
    }

    async fn index_batch(&self, batch: &[TextChunk]) -> Result<(), RetrievalError> {
        let inputs: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed(&inputs, &self.embedding_model).await?;
        if embeddings.len() != batch.len() {
            return Err(RetrievalError::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                embeddings.len()
            )));
        }

        let items = batch
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                let stored = StoredChunk {
                    chunk_id: chunk.chunk_id.clone(),
                    content: chunk.text.clone(),
                    source: chunk.source.clone(),
                    metadata: Some(json!({
                        "filename": chunk.source,
                        "relative_path": chunk.relative_path,
                        "chunk_index": chunk.chunk_index,
                        "start_offset": chunk.start_offset,
                    })),
                };
                (stored, embedding)
            })
            .collect();
        self.store.insert_batch(items).await
    }
}

#[async_trait]
impl Retriever for VectorIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if !self.is_ready() {
            return Err(RetrievalError::NotIndexed);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut embeddings = self
            .embedder
            .embed(&[query.to_string()], &self.embedding_model)
            .await?;
        let query_embedding = embeddings
            .pop()
            .ok_or_else(|| RetrievalError::Embedding("no embedding for query".to_string()))?;

        let results = self.store.search(&query_embedding, k).await?;
        Ok(results.into_iter().map(to_passage).collect())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn chunk_count(&self) -> Result<usize, RetrievalError> {
        self.store.count().await
    }

    async fn list_sources(&self, limit: usize) -> Result<Vec<(String, usize)>, RetrievalError> {
        self.store.list_sources(limit).await
    }
}

fn to_passage(result: ChunkSearchResult) -> RetrievedPassage {
    RetrievedPassage {
        text: result.chunk.content,
        source_name: result.chunk.source,
        similarity_score: similarity_from_cosine(result.score),
        metadata: result.chunk.metadata,
    }
}

/// Reported similarity for a cosine score: with `d = 1 - cosine`,
/// `max(0, 1 - d)` when `d <= 1`, else `1 / (1 + d)`, rounded to 3 decimals.
pub fn similarity_from_cosine(cosine: f32) -> f32 {
    let distance = 1.0 - cosine;
    let similarity = if distance <= 1.0 {
        (1.0 - distance).max(0.0)
    } else {
        1.0 / (1.0 + distance)
    };
    (similarity * 1000.0).round() / 1000.0
}
