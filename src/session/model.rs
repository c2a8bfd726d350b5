use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::context::QuestionKind;
use crate::rag::RetrievedPassage;

/// Marker written into every session file.
pub const SESSION_TYPE: &str = "unified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMethod {
    /// Fresh similarity search only.
    #[default]
    SearchRag,
    /// Search plus the previous turn's exchange and passages.
    ContextualRag,
}

impl QueryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMethod::SearchRag => "search_rag",
            QueryMethod::ContextualRag => "contextual_rag",
        }
    }
}

/// One question/answer exchange. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    #[serde(rename = "response", alias = "answer")]
    pub answer: String,
    #[serde(rename = "sources", default)]
    pub passages: Vec<RetrievedPassage>,
    #[serde(rename = "context_reference", default)]
    pub context_flag: bool,
    #[serde(default = "default_question_kind")]
    pub question_type: QuestionKind,
    #[serde(default)]
    pub method: QueryMethod,
    #[serde(default)]
    pub success: bool,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

fn default_question_kind() -> QuestionKind {
    QuestionKind::General
}

/// RFC 3339, or an ISO timestamp without offset taken as local time.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let naive = raw
        .parse::<NaiveDateTime>()
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))?;
    Ok(naive
        .and_local_timezone(Local)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub turns: Vec<ConversationTurn>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            turns: Vec::new(),
        }
    }

    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// On-disk layout of `<sessions_dir>/<id>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionFile {
    pub session_name: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub conversation_count: usize,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
    #[serde(default = "default_session_type")]
    pub session_type: String,
}

fn default_session_type() -> String {
    SESSION_TYPE.to_string()
}

impl SessionFile {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_name: session.session_id.clone(),
            saved_at: Utc::now(),
            conversation_count: session.turns.len(),
            conversation_history: session.turns.clone(),
            session_type: SESSION_TYPE.to_string(),
        }
    }

    pub fn into_session(self) -> Session {
        Session {
            session_id: self.session_name,
            turns: self.conversation_history,
        }
    }
}

/// Entry of a session listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub session_name: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
    pub turns_count: usize,
    pub is_current: bool,
}

impl SessionSummary {
    pub fn current(session: &Session) -> Self {
        let now = Utc::now();
        Self {
            session_id: session.session_id.clone(),
            session_name: session.session_id.clone(),
            created_at: session.turns.first().map(|t| t.timestamp).unwrap_or(now),
            last_activity: session.last_turn().map(|t| t.timestamp).unwrap_or(now),
            message_count: session.turns.len(),
            turns_count: session.turns.len(),
            is_current: true,
        }
    }

    pub fn stored(session_id: &str, file: &SessionFile) -> Self {
        let last_activity = file
            .conversation_history
            .last()
            .map(|t| t.timestamp)
            .unwrap_or(file.saved_at);
        Self {
            session_id: session_id.to_string(),
            session_name: file.session_name.clone(),
            created_at: file
                .conversation_history
                .first()
                .map(|t| t.timestamp)
                .unwrap_or(file.saved_at),
            last_activity,
            message_count: file.conversation_count,
            turns_count: file.conversation_count,
            is_current: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn turn_uses_persisted_key_names() {
        let turn = ConversationTurn {
            question: "What is Scrum?".to_string(),
            answer: "An agile framework.".to_string(),
            passages: Vec::new(),
            context_flag: false,
            question_type: QuestionKind::Definition,
            method: QueryMethod::SearchRag,
            success: true,
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&turn).unwrap();

        assert_eq!(value["response"], "An agile framework.");
        assert_eq!(value["context_reference"], false);
        assert_eq!(value["question_type"], "definition");
        assert_eq!(value["method"], "search_rag");
        assert!(value["sources"].as_array().unwrap().is_empty());
    }

    #[test]
    fn turn_accepts_answer_alias_and_extra_keys() {
        let value = json!({
            "question": "q",
            "answer": "a",
            "sources_count": 0,
            "timestamp": "2024-05-01T10:00:00Z"
        });

        let turn: ConversationTurn = serde_json::from_value(value).unwrap();

        assert_eq!(turn.answer, "a");
        assert_eq!(turn.method, QueryMethod::SearchRag);
        assert_eq!(turn.question_type, QuestionKind::General);
    }

    #[test]
    fn legacy_file_with_naive_timestamps_parses() {
        let value = json!({
            "session_name": "old_session",
            "saved_at": "2024-05-01T10:05:00.123456",
            "conversation_count": 1,
            "conversation_history": [{
                "question": "Et ses avantages ?",
                "response": "Plusieurs.",
                "sources": [{
                    "content": "texte",
                    "source": "scrum.md",
                    "similarity": 0.8,
                    "metadata": { "filename": "scrum.md" }
                }],
                "context_reference": true,
                "question_type": "reference_contextuelle",
                "method": "contextual_rag",
                "success": true,
                "session": "old_session",
                "timestamp": "2024-05-01T10:00:00.123456"
            }]
        });

        let file: SessionFile = serde_json::from_value(value).unwrap();
        let turn = &file.conversation_history[0];

        let expected: NaiveDateTime = "2024-05-01T10:00:00.123456".parse().unwrap();
        assert_eq!(turn.timestamp.with_timezone(&Local).naive_local(), expected);
        assert!(file.saved_at > turn.timestamp);
        assert_eq!(turn.question_type, QuestionKind::ContextualReference);
        assert_eq!(turn.passages[0].source_name, "scrum.md");
        assert_eq!(file.session_type, SESSION_TYPE);
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let value = json!({ "question": "q", "response": "a", "timestamp": "yesterday" });

        assert!(serde_json::from_value::<ConversationTurn>(value).is_err());
    }
}
