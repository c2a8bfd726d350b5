//! Splits corpus documents into overlapping, sentence-aligned chunks.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::corpus::CorpusDocument;

/// Chunking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A text chunk with source information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    /// Stable id derived from the document path and chunk index.
    pub chunk_id: String,
    pub text: String,
    /// Document file name.
    pub source: String,
    pub relative_path: String,
    /// Character offset in the original document
    pub start_offset: usize,
    pub chunk_index: usize,
}

pub struct ChunkEngine {
    config: ChunkConfig,
}

impl ChunkEngine {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn split_document(&self, document: &CorpusDocument) -> Vec<TextChunk> {
        self.split_text(
            &document.raw_text,
            &document.metadata.filename,
            &document.metadata.relative_path,
        )
    }

    pub fn split_documents(&self, documents: &[CorpusDocument]) -> Vec<TextChunk> {
        documents
            .iter()
            .flat_map(|doc| self.split_document(doc))
            .collect()
    }

    /// Split text into overlapping chunks.
    pub fn split_text(&self, text: &str, source: &str, relative_path: &str) -> Vec<TextChunk> {
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap.min(chunk_size - 1);

        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < total_chars {
            let end = (start + chunk_size).min(total_chars);
            let window = &chars[start..end];

            // Try to break at sentence boundary
            let taken = if end < total_chars {
                sentence_boundary(window).unwrap_or(window.len())
            } else {
                window.len()
            };

            let chunk_text: String = window[..taken].iter().collect();
            let trimmed = chunk_text.trim();
            if !trimmed.is_empty() {
                let chunk_index = chunks.len();
                chunks.push(TextChunk {
                    chunk_id: chunk_id(relative_path, chunk_index),
                    text: trimmed.to_string(),
                    source: source.to_string(),
                    relative_path: relative_path.to_string(),
                    start_offset: start,
                    chunk_index,
                });
            }

            if start + taken >= total_chars {
                break;
            }
            start += taken.saturating_sub(overlap).max(1);
        }

        chunks
    }
}

/// SHA-256 hex of `relative_path:chunk_index`.
pub fn chunk_id(relative_path: &str, chunk_index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", relative_path, chunk_index).as_bytes());
    hex::encode(hasher.finalize())
}

/// Length (in chars) up to and including the last sentence ending found in
/// the final 20% of the window.
fn sentence_boundary(window: &[char]) -> Option<usize> {
    let search_start = (window.len() * 80) / 100;
    (search_start..window.len().saturating_sub(1))
        .rev()
        .find(|&i| matches!(window[i], '.' | '!' | '?') && matches!(window[i + 1], ' ' | '\n'))
        .map(|i| i + 2)
}
