use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use super::commands::{CliCommand, HELP_TEXT};
use crate::chat::QueryResult;
use crate::session::{export_file_name, ExportFormat};
use crate::state::AppState;

const COMMANDS: &[&str] = &[
    "!help",
    "!session",
    "!history",
    "!sessions",
    "!load",
    "!delete",
    "!export",
    "!clear",
    "!new",
    "!new_conversation",
    "!quit",
    "!exit",
];

/// Completion and hints for `!` commands.
struct ReplHelper;

impl Helper for ReplHelper {}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('!') || line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('!') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with('!') || line.contains(' ') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Validator for ReplHelper {}

enum Flow {
    Continue,
    Quit,
}

/// Runs the interactive loop until `!quit` or Ctrl-D.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let mut rl: Editor<ReplHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(ReplHelper));

    print_banner(&state).await;

    loop {
        match rl.readline(">> ") {
            Ok(line) => {
                let Some(command) = CliCommand::parse(&line) else {
                    continue;
                };
                let _ = rl.add_history_entry(line.trim());

                if command.needs_confirmation() && !confirm(&mut rl)? {
                    println!("{}", "Cancelled.".bright_black());
                    continue;
                }
                if let Flow::Quit = execute(&state, command).await {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type !quit to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

async fn print_banner(state: &AppState) {
    let info = state.chat.info().await;
    println!("{}", "=== RAG Chat ===".bright_magenta().bold());
    println!(
        "{}",
        format!(
            "Session: {} ({} turns) | documents: {} | index ready: {} | API ready: {}",
            info.session_name,
            info.conversations,
            state.documents_loaded,
            info.vector_store_ready,
            info.api_ready
        )
        .bright_black()
    );
    println!("{}", "Type a question, or !help for commands.".bright_black());
    println!();
}

fn confirm(rl: &mut Editor<ReplHelper, DefaultHistory>) -> Result<bool> {
    match rl.readline("Are you sure? (y/N) ") {
        Ok(answer) => Ok(matches!(
            answer.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        )),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

async fn execute(state: &AppState, command: CliCommand) -> Flow {
    let chat = &state.chat;
    match command {
        CliCommand::Help => println!("{}", HELP_TEXT),
        CliCommand::Session => {
            let info = chat.info().await;
            println!(
                "Session {} | {} turns | model {}",
                info.session_name.bold(),
                info.conversations,
                chat.completion_model().await
            );
        }
        CliCommand::History => {
            let history = chat.history().await;
            if history.is_empty() {
                println!("{}", "No conversation yet.".bright_black());
            }
            for (i, turn) in history.iter().enumerate() {
                println!("{}", format!("[{}] Q: {}", i + 1, turn.question).green());
                println!("{}", format!("[{}] A: {}", i + 1, preview(&turn.answer, 200)).bright_blue());
            }
        }
        CliCommand::Sessions => {
            for summary in chat.list_sessions().await {
                let marker = if summary.is_current { "*" } else { " " };
                println!(
                    "{} {} ({} turns, last activity {})",
                    marker,
                    summary.session_id,
                    summary.turns_count,
                    summary.last_activity.format("%Y-%m-%d %H:%M")
                );
            }
        }
        CliCommand::Load(id) => match chat.load_session(&id).await {
            Ok(()) => println!("{}", format!("Session {} loaded.", id).bright_green()),
            Err(err) => eprintln!("{}", err.to_string().red()),
        },
        CliCommand::Delete(id) => match chat.delete_session(&id).await {
            Ok(()) => println!("{}", format!("Session {} deleted.", id).bright_green()),
            Err(err) => eprintln!("{}", err.to_string().red()),
        },
        CliCommand::Export(format) => match export(state, format).await {
            Ok(file_name) => println!("{}", format!("Exported to {}", file_name).bright_green()),
            Err(err) => eprintln!("{}", format!("Export failed: {:#}", err).red()),
        },
        CliCommand::Clear => {
            chat.clear_history().await;
            println!("{}", "Conversation history cleared.".bright_green());
        }
        CliCommand::New => match chat.new_session(None).await {
            Ok((old, new)) => println!(
                "{}",
                format!("Started session {} (previous: {}).", new, old).bright_green()
            ),
            Err(err) => eprintln!("{}", err.to_string().red()),
        },
        CliCommand::Quit => return Flow::Quit,
        CliCommand::Ask(question) => match chat.query(&question).await {
            Ok(result) => print_answer(&result),
            Err(err) => eprintln!("{}", format!("Error: {}", err).red()),
        },
        CliCommand::Usage(usage) => println!("{}", format!("Usage: {}", usage).yellow()),
        CliCommand::Unknown(line) => println!(
            "{}",
            format!("Unknown command {}. Type !help.", line).bright_black()
        ),
    }
    Flow::Continue
}

async fn export(state: &AppState, format: ExportFormat) -> Result<String> {
    let (session_id, content) = state.chat.export(format).await?;
    let file_name = export_file_name(&session_id, format);
    tokio::fs::write(&file_name, content)
        .await
        .with_context(|| format!("Failed to write {}", file_name))?;
    Ok(file_name)
}

fn print_answer(result: &QueryResult) {
    for line in result.answer.lines() {
        println!("{}", line.bright_blue());
    }
    println!(
        "{}",
        format!("[{} | {}]", result.method.as_str(), result.question_type).bright_black()
    );
    if !result.passages.is_empty() {
        println!("{}", "Sources:".bright_black());
        for passage in &result.passages {
            println!(
                "{}",
                format!(
                    "  - {} ({:.3})",
                    passage.source_name, passage.similarity_score
                )
                .bright_black()
            );
        }
    }
    if !result.persisted {
        println!("{}", "Warning: the session could not be saved.".yellow());
    }
    println!();
}

fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_chars {
        return Borrowed(text);
    }
    let truncated: String = text.chars().take(max_chars).collect();
    Owned(format!("{}...", truncated))
}
