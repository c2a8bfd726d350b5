//! `!`-prefixed REPL commands.

use crate::session::ExportFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Help,
    Session,
    History,
    Sessions,
    Load(String),
    Delete(String),
    Export(ExportFormat),
    Clear,
    New,
    Quit,
    /// Anything not starting with `!`.
    Ask(String),
    /// A `!` command with missing or malformed arguments.
    Usage(&'static str),
    Unknown(String),
}

impl CliCommand {
    /// Returns `None` for blank input.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('!') else {
            return Some(CliCommand::Ask(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();

        let command = match name.as_str() {
            "help" => CliCommand::Help,
            "session" => CliCommand::Session,
            "history" => CliCommand::History,
            "sessions" => CliCommand::Sessions,
            "load" => match arg {
                Some(id) => CliCommand::Load(id.to_string()),
                None => CliCommand::Usage("!load <session_id>"),
            },
            "delete" => match arg {
                Some(id) => CliCommand::Delete(id.to_string()),
                None => CliCommand::Usage("!delete <session_id>"),
            },
            "export" => match arg.map(str::parse::<ExportFormat>) {
                None => CliCommand::Export(ExportFormat::Text),
                Some(Ok(format)) => CliCommand::Export(format),
                Some(Err(_)) => CliCommand::Usage("!export [json|text]"),
            },
            "clear" => CliCommand::Clear,
            "new" | "new_conversation" => CliCommand::New,
            "quit" | "exit" => CliCommand::Quit,
            _ => CliCommand::Unknown(line.to_string()),
        };
        Some(command)
    }

    /// Commands that discard or switch the active conversation.
    pub fn needs_confirmation(&self) -> bool {
        matches!(
            self,
            CliCommand::Clear | CliCommand::New | CliCommand::Load(_) | CliCommand::Delete(_)
        )
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  !help                 show this help
  !session              show the active session
  !history              show the turns of the active session
  !sessions             list saved sessions
  !load <id>            switch to a saved session
  !delete <id>          delete a saved session
  !export [json|text]   write the transcript to the working directory
  !clear                forget the turns of the active session
  !new                  start a new session (alias !new_conversation)
  !quit                 exit (alias !exit)
Anything else is sent as a question.";
