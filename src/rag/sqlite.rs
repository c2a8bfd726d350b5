//! SQLite-backed RAG store implementation.
//!
//! In-process vector store using SQLite for chunk rows and
//! brute-force cosine similarity for search.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkSearchResult, RagStore, StoredChunk};
use crate::core::config::AppPaths;
use crate::core::errors::RetrievalError;

pub struct SqliteRagStore {
    pool: SqlitePool,
}

impl SqliteRagStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, RetrievalError> {
        Self::with_path(paths.index_db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, RetrievalError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(RetrievalError::store)?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::debug!("Opened vector index at {}", db_path.display());
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), RetrievalError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS corpus_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                metadata TEXT DEFAULT '{}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RetrievalError::store)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_corpus_source ON corpus_chunks(source)")
            .execute(&self.pool)
            .await
            .map_err(RetrievalError::store)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(RetrievalError::store)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        let metadata_str: Option<String> = row.get("metadata");
        let metadata = metadata_str.and_then(|raw| serde_json::from_str::<Value>(&raw).ok());

        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            metadata,
        }
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    async fn insert_batch(
        &self,
        items: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<(), RetrievalError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(RetrievalError::store)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = match &chunk.metadata {
                Some(metadata) => serde_json::to_string(metadata).map_err(RetrievalError::store)?,
                None => "{}".to_string(),
            };

            sqlx::query(
                "INSERT OR REPLACE INTO corpus_chunks (chunk_id, content, source, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.source)
            .bind(&metadata_str)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(RetrievalError::store)?;
        }

        tx.commit().await.map_err(RetrievalError::store)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, RetrievalError> {
        let rows = sqlx::query(
            "SELECT chunk_id, content, source, metadata, embedding
             FROM corpus_chunks",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RetrievalError::store)?;

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Option<Vec<u8>> = row.get("embedding");
                let embedding_bytes = embedding_bytes.filter(|bytes| !bytes.is_empty())?;
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                let score = cosine_similarity(query_embedding, &stored_emb);

                Some(ChunkSearchResult {
                    chunk: Self::row_to_chunk(row),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize, RetrievalError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM corpus_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(RetrievalError::store)?;

        Ok(count as usize)
    }

    async fn list_sources(&self, limit: usize) -> Result<Vec<(String, usize)>, RetrievalError> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS chunk_count
             FROM corpus_chunks
             GROUP BY source
             ORDER BY chunk_count DESC, source ASC
             LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(RetrievalError::store)?;

        Ok(rows
            .iter()
            .map(|row| {
                let source: String = row.get("source");
                let count: i64 = row.get("chunk_count");
                (source, count as usize)
            })
            .collect())
    }

    async fn reindex_with_model(&self, embedding_model: &str) -> Result<(), RetrievalError> {
        sqlx::query("DELETE FROM corpus_chunks")
            .execute(&self.pool)
            .await
            .map_err(RetrievalError::store)?;

        sqlx::query(
            "INSERT OR REPLACE INTO index_meta (key, value, updated_at)
             VALUES ('embedding_model', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(embedding_model)
        .execute(&self.pool)
        .await
        .map_err(RetrievalError::store)?;

        Ok(())
    }

    async fn embedding_model(&self) -> Result<Option<String>, RetrievalError> {
        sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'embedding_model'")
            .fetch_optional(&self.pool)
            .await
            .map_err(RetrievalError::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(dir: &tempfile::TempDir) -> SqliteRagStore {
        SqliteRagStore::with_path(dir.path().join("index.db"))
            .await
            .unwrap()
    }

    fn make_chunk(id: &str, content: &str, source: &str) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            source: source.to_string(),
            metadata: Some(serde_json::json!({ "chunk_index": 0 })),
        }
    }

    #[tokio::test]
    async fn insert_and_search_ranks_by_cosine() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;

        store
            .insert_batch(vec![
                (make_chunk("c1", "Scrum roles", "scrum.md"), vec![1.0, 0.0, 0.0]),
                (make_chunk("c2", "Budget lines", "budget.md"), vec![0.0, 1.0, 0.0]),
                (make_chunk("c3", "Sprint review", "scrum.md"), vec![0.9, 0.1, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 3);

        let results = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
        assert!(results[0].score > 0.99);
        assert_eq!(results[0].chunk.metadata.as_ref().unwrap()["chunk_index"], 0);
    }

    #[tokio::test]
    async fn insert_replaces_existing_chunk_id() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;

        store
            .insert_batch(vec![(make_chunk("c1", "old", "a.md"), vec![1.0])])
            .await
            .unwrap();
        store
            .insert_batch(vec![(make_chunk("c1", "new", "a.md"), vec![1.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let results = store.search(&[1.0], 5).await.unwrap();
        assert_eq!(results[0].chunk.content, "new");
    }

    #[tokio::test]
    async fn list_sources_orders_by_chunk_count() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;

        store
            .insert_batch(vec![
                (make_chunk("c1", "x", "a.md"), vec![1.0]),
                (make_chunk("c2", "y", "b.md"), vec![1.0]),
                (make_chunk("c3", "z", "b.md"), vec![1.0]),
            ])
            .await
            .unwrap();

        let sources = store.list_sources(20).await.unwrap();
        assert_eq!(
            sources,
            vec![("b.md".to_string(), 2), ("a.md".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn reindex_with_model_clears_and_records_model() {
        let tmp = tempfile::tempdir().unwrap();
        let store = test_store(&tmp).await;
        assert_eq!(store.embedding_model().await.unwrap(), None);

        store
            .insert_batch(vec![(make_chunk("c1", "data", "a.md"), vec![1.0])])
            .await
            .unwrap();
        store.reindex_with_model("embed-v2").await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(
            store.embedding_model().await.unwrap().as_deref(),
            Some("embed-v2")
        );
    }

    #[test]
    fn cosine_handles_mismatched_and_zero_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }
}
