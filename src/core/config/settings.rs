//! Typed view over the merged YAML configuration.
//!
//! Every section and field has a default, so a missing `config.yml` yields a
//! working local setup.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub corpus: CorpusSettings,
    pub retrieval: RetrievalSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub server: ServerSettings,
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Prefix of generated session names (`<prefix>_<YYYYmmdd_HHMMSS>`).
    pub session_prefix: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            session_prefix: "session".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    pub dir: String,
    /// Sub-directory of `dir` scanned for markdown files.
    pub documents_subdir: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            dir: "Corpus".to_string(),
            documents_subdir: "Corpus documentaire".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub previous_passages: usize,
    pub prompt_passages: usize,
    pub passage_char_budget: usize,
    pub contextual_similarity_floor: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            previous_passages: 2,
            prompt_passages: 3,
            passage_char_budget: 400,
            contextual_similarity_floor: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub require_api_key: bool,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://codestral.mistral.ai".to_string(),
            model: "codestral-latest".to_string(),
            api_key: None,
            require_api_key: true,
            max_tokens: 2000,
            temperature: 0.1,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            api_key: None,
            batch_size: 32,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Session resumed (or created) by the web server at startup.
    pub session_name: String,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            session_name: "web_session".to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// Optional overrides for the context classifier rule tables. `None` keeps the
/// built-in vocabulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub keywords: Option<Vec<String>>,
    pub starters: Option<Vec<String>>,
}
