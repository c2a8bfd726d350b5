//! Keyword rule tables deciding whether a question leans on the previous turn.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::config::settings::ClassifierSettings;

/// Maximal runs of alphanumerics or apostrophes, used to find the first word.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{Alphabetic}\p{N}']+").expect("token pattern is valid"));

/// Reference words, English then French. Each entry matches as a substring of the
/// lower-cased question, so short words that sit inside common words are left out.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "this",
    "that",
    "these",
    "those",
    "previous",
    "previously",
    "above",
    "earlier",
    "its",
    "his",
    "their",
    "them",
    "they",
    "you said",
    "you mentioned",
    "your answer",
    "mentioned above",
    "cette",
    "cela",
    "precedent",
    "ci-dessus",
    "avant",
    "le point",
    "la point",
    "point",
    "cette information",
    "ce que tu as dit",
    "tu as mentionne",
    "plus haut",
    "dans ta reponse",
    "tu disais",
    "leurs",
    "leur",
    "elle",
    "elles",
];

pub const DEFAULT_STARTERS: &[&str] = &[
    "its", "his", "her", "their", "ses", "son", "sa", "leur", "leurs",
];

/// Coarse question category recorded on every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[serde(alias = "reference_contextuelle")]
    ContextualReference,
    Procedure,
    Definition,
    #[serde(alias = "explication")]
    Explanation,
    Information,
    General,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::ContextualReference => "contextual_reference",
            QuestionKind::Procedure => "procedure",
            QuestionKind::Definition => "definition",
            QuestionKind::Explanation => "explanation",
            QuestionKind::Information => "information",
            QuestionKind::General => "general",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First matching row wins.
const KIND_TABLE: &[(QuestionKind, &[&str])] = &[
    (
        QuestionKind::ContextualReference,
        &["cette", "cela", "precedent", "this", "that", "previous"],
    ),
    (QuestionKind::Procedure, &["comment", "how", "procedure", "steps"]),
    (
        QuestionKind::Definition,
        &["qu'est-ce", "what", "definition", "define"],
    ),
    (
        QuestionKind::Explanation,
        &["pourquoi", "why", "raison", "reason"],
    ),
    (
        QuestionKind::Information,
        &["info", "information", "details"],
    ),
];

/// Lower-cased entries matched as substrings of the normalized question.
#[derive(Debug, Clone, Default)]
struct Vocabulary(Vec<String>);

impl Vocabulary {
    fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        Self(
            entries
                .iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        )
    }

    fn matches(&self, normalized: &str) -> bool {
        self.0.iter().any(|entry| normalized.contains(entry.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct ContextClassifier {
    keywords: Vocabulary,
    starters: Vec<String>,
    kinds: Vec<(QuestionKind, Vocabulary)>,
}

impl Default for ContextClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS, DEFAULT_STARTERS)
    }
}

impl ContextClassifier {
    pub fn new<K: AsRef<str>, S: AsRef<str>>(keywords: &[K], starters: &[S]) -> Self {
        Self {
            keywords: Vocabulary::new(keywords),
            starters: starters
                .iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            kinds: KIND_TABLE
                .iter()
                .map(|(kind, words)| (*kind, Vocabulary::new(*words)))
                .collect(),
        }
    }

    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        let default_keywords: Vec<String> =
            DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect();
        let default_starters: Vec<String> =
            DEFAULT_STARTERS.iter().map(|s| s.to_string()).collect();
        Self::new(
            settings.keywords.as_deref().unwrap_or(&default_keywords),
            settings.starters.as_deref().unwrap_or(&default_starters),
        )
    }

    /// True when the question appears to refer to the preceding turn.
    pub fn is_contextual(&self, question: &str) -> bool {
        let normalized = question.trim().to_lowercase();
        if normalized.is_empty() {
            return false;
        }

        if self.keywords.matches(&normalized) {
            return true;
        }

        let first = TOKEN_RE.find(&normalized).map(|m| m.as_str());
        self.starters
            .iter()
            .any(|starter| first == Some(starter.as_str()))
    }

    pub fn question_kind(&self, question: &str) -> QuestionKind {
        let normalized = question.trim().to_lowercase();
        self.kinds
            .iter()
            .find(|(_, vocabulary)| vocabulary.matches(&normalized))
            .map(|(kind, _)| *kind)
            .unwrap_or(QuestionKind::General)
    }
}
