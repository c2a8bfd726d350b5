use std::fmt;
use std::str::FromStr;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::model::Session;
use crate::core::errors::SessionIoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    #[default]
    Text,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Text => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(format!("unknown export format '{}' (expected json or text)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Json => f.write_str("json"),
            ExportFormat::Text => f.write_str("text"),
        }
    }
}

/// Renders the whole transcript of `session`.
pub fn export_session(session: &Session, format: ExportFormat) -> Result<String, SessionIoError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "session": session.session_id,
            "exported_at": Utc::now().to_rfc3339(),
            "conversations": session.turns,
        }))?),
        ExportFormat::Text => Ok(render_text(session)),
    }
}

fn render_text(session: &Session) -> String {
    let mut lines = vec![
        format!("=== CONVERSATION {} ===", session.session_id),
        format!("Exported: {}", Local::now().format("%d/%m/%Y %H:%M")),
        String::new(),
    ];

    for (i, turn) in session.turns.iter().enumerate() {
        let n = i + 1;
        lines.push(format!("[{}] Q: {}", n, turn.question));
        lines.push(format!("[{}] A: {}", n, turn.answer));
        if !turn.passages.is_empty() {
            lines.push(format!("    Sources: {} documents", turn.passages.len()));
        }
        lines.push("---".to_string());
    }
    lines.join("\n")
}

/// `<session>_export_<YYYYmmdd_HHMMSS>.<ext>`
pub fn export_file_name(session_id: &str, format: ExportFormat) -> String {
    format!(
        "{}_export_{}.{}",
        session_id,
        Local::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}
