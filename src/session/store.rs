//! JSON file-per-session persistence.
//!
//! ```text
//! sessions/
//! ├── web_session.json
//! └── session_20240501_101500.json
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::model::{Session, SessionFile, SessionSummary};
use crate::core::errors::SessionIoError;

pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> Result<PathBuf, SessionIoError>;

    fn load(&self, session_id: &str) -> Result<Session, SessionIoError>;

    /// Summaries of every readable stored session (`is_current` false).
    fn list(&self) -> Result<Vec<SessionSummary>, SessionIoError>;

    /// `Ok(false)` when nothing was stored under `session_id`.
    fn delete(&self, session_id: &str) -> Result<bool, SessionIoError>;

    fn exists(&self, session_id: &str) -> Result<bool, SessionIoError>;
}

/// Ids become file names, so only `[A-Za-z0-9_.-]` is allowed and a
/// leading dot is rejected.
pub fn validate_session_id(session_id: &str) -> Result<(), SessionIoError> {
    let valid = !session_id.is_empty()
        && !session_id.starts_with('.')
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(SessionIoError::InvalidId(session_id.to_string()))
    }
}

pub struct JsonSessionStore {
    sessions_dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    fn session_file_path(&self, session_id: &str) -> Result<PathBuf, SessionIoError> {
        validate_session_id(session_id)?;
        Ok(self.sessions_dir.join(format!("{}.json", session_id)))
    }

    fn read_file(path: &Path) -> Result<SessionFile, SessionIoError> {
        let contents = fs::read_to_string(path).map_err(|e| SessionIoError::io(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl SessionStore for JsonSessionStore {
    fn save(&self, session: &Session) -> Result<PathBuf, SessionIoError> {
        let path = self.session_file_path(&session.session_id)?;
        fs::create_dir_all(&self.sessions_dir)
            .map_err(|e| SessionIoError::io(&self.sessions_dir, e))?;

        let body = serde_json::to_vec_pretty(&SessionFile::from_session(session))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| SessionIoError::io(&path, e))?;
        file.lock_exclusive()
            .map_err(|e| SessionIoError::io(&path, e))?;

        let written = file
            .set_len(0)
            .and_then(|_| file.write_all(&body))
            .and_then(|_| file.flush());
        let unlocked = FileExt::unlock(&file);
        written.map_err(|e| SessionIoError::io(&path, e))?;
        unlocked.map_err(|e| SessionIoError::io(&path, e))?;

        tracing::debug!(
            "Saved session {} ({} turns) to {}",
            session.session_id,
            session.turns.len(),
            path.display()
        );
        Ok(path)
    }

    fn load(&self, session_id: &str) -> Result<Session, SessionIoError> {
        let path = self.session_file_path(session_id)?;
        if !path.exists() {
            return Err(SessionIoError::NotFound(session_id.to_string()));
        }
        let mut session = Self::read_file(&path)?.into_session();
        // The file name is the id; the stored name may predate a rename.
        session.session_id = session_id.to_string();
        Ok(session)
    }

    fn list(&self) -> Result<Vec<SessionSummary>, SessionIoError> {
        let entries = match fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionIoError::io(&self.sessions_dir, e)),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut summaries = Vec::new();
        for path in paths {
            let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_session_id(session_id).is_err() {
                continue;
            }
            match Self::read_file(&path) {
                Ok(file) => summaries.push(SessionSummary::stored(session_id, &file)),
                Err(err) => tracing::warn!("Skipping unreadable session file: {}", err),
            }
        }

        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        Ok(summaries)
    }

    fn delete(&self, session_id: &str) -> Result<bool, SessionIoError> {
        let path = self.session_file_path(session_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionIoError::io(&path, e)),
        }
    }

    fn exists(&self, session_id: &str) -> Result<bool, SessionIoError> {
        Ok(self.session_file_path(session_id)?.exists())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::context::QuestionKind;
    use crate::rag::RetrievedPassage;
    use crate::session::model::{ConversationTurn, QueryMethod};

    fn turn(question: &str) -> ConversationTurn {
        ConversationTurn {
            question: question.to_string(),
            answer: format!("answer to {}", question),
            passages: vec![RetrievedPassage {
                text: "passage".to_string(),
                source_name: "scrum.md".to_string(),
                similarity_score: 0.812,
                metadata: None,
            }],
            context_flag: false,
            question_type: QuestionKind::General,
            method: QueryMethod::SearchRag,
            success: true,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn save_then_load_preserves_turn_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path().join("sessions"));
        let mut session = Session::new("demo");
        session.turns = vec![turn("first"), turn("second"), turn("third")];

        let path = store.save(&session).unwrap();
        let loaded = store.load("demo").unwrap();

        assert_eq!(path, tmp.path().join("sessions").join("demo.json"));
        assert_eq!(loaded, session);
    }

    #[test]
    fn saved_file_has_expected_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path());
        let mut session = Session::new("demo");
        session.turns.push(turn("q"));

        let path = store.save(&session).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(value["session_name"], "demo");
        assert_eq!(value["conversation_count"], 1);
        assert_eq!(value["session_type"], "unified");
        assert!(value["saved_at"].is_string());
        assert_eq!(value["conversation_history"][0]["sources"][0]["source"], "scrum.md");
    }

    #[test]
    fn shorter_save_overwrites_whole_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path());
        let mut session = Session::new("demo");
        session.turns = vec![turn("a long question"), turn("another")];
        store.save(&session).unwrap();

        session.turns.clear();
        store.save(&session).unwrap();

        assert!(store.load("demo").unwrap().turns.is_empty());
    }

    #[test]
    fn rejects_path_traversal_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path());

        for id in ["../escape", ".hidden", "a/b", "", "name with space"] {
            assert!(
                matches!(store.load(id), Err(SessionIoError::InvalidId(_))),
                "{id} should be rejected"
            );
        }
        assert!(validate_session_id("session_20240501_101500").is_ok());
        assert!(validate_session_id("web-session.v2").is_ok());
    }

    #[test]
    fn load_and_delete_missing_session() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path());

        assert!(matches!(store.load("nope"), Err(SessionIoError::NotFound(_))));
        assert!(!store.delete("nope").unwrap());
        assert!(!store.exists("nope").unwrap());
    }

    #[test]
    fn list_skips_corrupt_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path());
        let mut session = Session::new("good");
        session.turns.push(turn("q"));
        store.save(&session).unwrap();
        fs::write(tmp.path().join("bad.json"), "{ not json").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let summaries = store.list().unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_id, "good");
        assert_eq!(summaries[0].turns_count, 1);
        assert!(!summaries[0].is_current);
    }

    #[test]
    fn files_with_naive_timestamps_are_listed_and_loaded() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path());
        let legacy = r#"{
            "session_name": "legacy",
            "saved_at": "2024-05-01T10:05:00.123456",
            "conversation_count": 1,
            "conversation_history": [{
                "question": "Qu'est-ce que Scrum ?",
                "response": "Un cadre agile.",
                "sources": [],
                "question_type": "definition",
                "timestamp": "2024-05-01T10:00:00.123456"
            }]
        }"#;
        fs::write(tmp.path().join("legacy.json"), legacy).unwrap();

        let summaries = store.list().unwrap();
        let loaded = store.load("legacy").unwrap();

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_id, "legacy");
        assert_eq!(loaded.turns.len(), 1);
        assert_eq!(loaded.turns[0].answer, "Un cadre agile.");
    }

    #[test]
    fn list_on_missing_directory_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path().join("absent"));

        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::new(tmp.path());
        store.save(&Session::new("old")).unwrap();

        assert!(store.exists("old").unwrap());
        assert!(store.delete("old").unwrap());
        assert!(!store.exists("old").unwrap());
    }
}
