//! Reads the fixed document corpus from disk.
//!
//! Layout:
//! ```text
//! <corpus>/
//! ├── <documents_subdir>/*.md   markdown documents (not recursive)
//! └── *.txt                     plain-text documents
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Markdown,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    /// Path relative to the corpus root.
    pub relative_path: String,
    pub document_type: DocumentType,
    pub loaded_at: DateTime<Utc>,
}

/// One corpus file, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub source_path: PathBuf,
    pub raw_text: String,
    pub metadata: DocumentMetadata,
}

pub struct CorpusLoader {
    root: PathBuf,
    documents_subdir: String,
}

impl CorpusLoader {
    pub fn new(root: impl Into<PathBuf>, documents_subdir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            documents_subdir: documents_subdir.into(),
        }
    }

    /// Loads markdown documents first, then plain-text ones. A file name seen
    /// once is never loaded again.
    pub fn load(&self) -> Vec<CorpusDocument> {
        let mut seen = HashSet::new();
        let mut documents = Vec::new();

        let markdown_dir = self.root.join(&self.documents_subdir);
        self.load_dir(&markdown_dir, "md", DocumentType::Markdown, &mut seen, &mut documents);
        self.load_dir(&self.root, "txt", DocumentType::Text, &mut seen, &mut documents);

        tracing::info!(
            "Loaded {} corpus documents from {}",
            documents.len(),
            self.root.display()
        );
        documents
    }

    fn load_dir(
        &self,
        dir: &Path,
        extension: &str,
        document_type: DocumentType,
        seen: &mut HashSet<String>,
        documents: &mut Vec<CorpusDocument>,
    ) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("Corpus directory {} unavailable: {}", dir.display(), err);
                return;
            }
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        for path in files {
            let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                continue;
            };
            if seen.contains(&filename) {
                tracing::debug!("Skipping duplicate corpus file {}", filename);
                continue;
            }

            let content = match fs::read(&path) {
                Ok(bytes) => ascii_only(&String::from_utf8_lossy(&bytes)),
                Err(err) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), err);
                    continue;
                }
            };
            if content.trim().is_empty() {
                continue;
            }

            let relative_path = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");

            seen.insert(filename.clone());
            documents.push(CorpusDocument {
                source_path: path.clone(),
                raw_text: content,
                metadata: DocumentMetadata {
                    filename,
                    relative_path,
                    document_type,
                    loaded_at: Utc::now(),
                },
            });
        }
    }
}

/// Drops every non-ASCII character.
fn ascii_only(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("Corpus documentaire");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("b_guide.md"), "# Guide\nProject management basics.").unwrap();
        fs::write(docs.join("a_intro.md"), "Intro caf\u{e9} text").unwrap();
        fs::write(docs.join("empty.md"), "   \n").unwrap();
        fs::write(docs.join("notes.rst"), "ignored").unwrap();
        fs::create_dir_all(docs.join("nested")).unwrap();
        fs::write(docs.join("nested").join("deep.md"), "not loaded").unwrap();
        fs::write(tmp.path().join("wiki.txt"), "Plain text corpus").unwrap();
        tmp
    }

    #[test]
    fn loads_markdown_then_text_sorted_by_name() {
        let tmp = corpus_fixture();
        let loader = CorpusLoader::new(tmp.path(), "Corpus documentaire");

        let docs = loader.load();
        let names: Vec<&str> = docs.iter().map(|d| d.metadata.filename.as_str()).collect();

        assert_eq!(names, vec!["a_intro.md", "b_guide.md", "wiki.txt"]);
        assert_eq!(docs[0].metadata.document_type, DocumentType::Markdown);
        assert_eq!(docs[2].metadata.document_type, DocumentType::Text);
        assert_eq!(docs[0].metadata.relative_path, "Corpus documentaire/a_intro.md");
    }

    #[test]
    fn strips_non_ascii_characters() {
        let tmp = corpus_fixture();
        let docs = CorpusLoader::new(tmp.path(), "Corpus documentaire").load();

        assert_eq!(docs[0].raw_text, "Intro caf text");
    }

    #[test]
    fn duplicate_file_names_load_once() {
        let tmp = corpus_fixture();
        fs::write(tmp.path().join("a_intro.txt"), "different extension").unwrap();
        fs::write(
            tmp.path().join("Corpus documentaire").join("wiki.txt"),
            "not scanned",
        )
        .unwrap();

        let docs = CorpusLoader::new(tmp.path(), "Corpus documentaire").load();
        let wiki: Vec<_> = docs
            .iter()
            .filter(|d| d.metadata.filename == "wiki.txt")
            .collect();

        assert_eq!(wiki.len(), 1);
        assert_eq!(wiki[0].raw_text, "Plain text corpus");
    }

    #[test]
    fn missing_corpus_yields_nothing() {
        let loader = CorpusLoader::new("/nonexistent/corpus", "docs");
        assert!(loader.load().is_empty());
    }
}
