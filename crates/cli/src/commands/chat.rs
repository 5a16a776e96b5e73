use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use boardsight_agent::{AgentRuntime, LlmClient};
use boardsight_connector::{BoardSync, RecordSource};
use boardsight_core::config::LoadOptions;
use boardsight_core::table::render_markdown;
use boardsight_core::{Board, SessionContext};
use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;
use tracing::info;

use crate::commands::ask::Connected;
use crate::commands::sync::render_outcome;
use crate::commands::CommandResult;

const COMMAND: &str = "chat";

const DATA_PREVIEW_ROWS: usize = 10;

const EXAMPLE_QUESTIONS: [&str; 6] = [
    "What's the total value of all deals?",
    "How many work orders are pending?",
    "Show me the top 5 deals by value",
    "What's the average deal size?",
    "How many deals closed this month?",
    "Compare deals vs work orders",
];

const HELP: &str = "Commands:\n  /sync            re-fetch both boards\n  /summary         executive summary of the current boards\n  /data [rows]     preview the cleaned boards (default 10 rows)\n  /examples        sample questions\n  /clear           clear the chat history\n  /export [path]   write the transcript to a text file\n  /quit            leave the chat\nAnything else is sent as a question.";

#[derive(Debug, PartialEq, Eq)]
pub enum ChatStep {
    Reply(String),
    Quit,
}

/// Interactive session over already-connected collaborators. Owns the
/// session state for the lifetime of the chat.
pub struct ChatSession<S, L> {
    board_sync: BoardSync<S>,
    agent: AgentRuntime<L>,
    runtime: Runtime,
    session: SessionContext,
    questions: usize,
}

impl<S, L> ChatSession<S, L>
where
    S: RecordSource,
    L: LlmClient,
{
    pub fn new(board_sync: BoardSync<S>, agent: AgentRuntime<L>, runtime: Runtime) -> Self {
        Self { board_sync, agent, runtime, session: SessionContext::new(), questions: 0 }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn questions(&self) -> usize {
        self.questions
    }

    pub fn sync(&mut self, now: DateTime<Utc>) -> Result<String, String> {
        self.runtime
            .block_on(self.board_sync.sync(&mut self.session, now))
            .map(|outcome| render_outcome(&outcome))
            .map_err(|error| format!("Sync failed: {error}"))
    }

    pub fn handle_line(&mut self, line: &str, now: DateTime<Utc>) -> ChatStep {
        let line = line.trim();
        if line.is_empty() {
            return ChatStep::Reply(String::new());
        }

        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, argument)) => (command, argument.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" | "/exit" => ChatStep::Quit,
            "/help" => ChatStep::Reply(HELP.to_string()),
            "/sync" => ChatStep::Reply(self.sync(now).unwrap_or_else(|message| message)),
            "/summary" => {
                let reply = self.runtime.block_on(self.agent.executive_summary(&mut self.session, now));
                ChatStep::Reply(reply.message)
            }
            "/data" => ChatStep::Reply(self.preview(argument)),
            "/examples" => ChatStep::Reply(examples()),
            "/clear" => {
                self.session.clear_history();
                ChatStep::Reply("Chat history cleared.".to_string())
            }
            "/export" => ChatStep::Reply(self.export(argument, now)),
            unknown if unknown.starts_with('/') => {
                ChatStep::Reply(format!("Unknown command `{unknown}`. Type /help for commands."))
            }
            _ => {
                self.questions += 1;
                let reply = self.runtime.block_on(self.agent.ask(&mut self.session, line, now));
                ChatStep::Reply(reply.message)
            }
        }
    }

    /// Reads lines until EOF or `/quit`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        writeln!(output, "Boardsight chat. Type /help for commands.")?;
        write!(output, "> ")?;
        output.flush()?;

        for line in input.lines() {
            match self.handle_line(&line?, Utc::now()) {
                ChatStep::Quit => break,
                ChatStep::Reply(reply) if reply.is_empty() => {}
                ChatStep::Reply(reply) => writeln!(output, "{reply}\n")?,
            }
            write!(output, "> ")?;
            output.flush()?;
        }

        writeln!(output)?;
        Ok(())
    }

    fn preview(&self, argument: &str) -> String {
        let rows = if argument.is_empty() {
            DATA_PREVIEW_ROWS
        } else {
            match argument.parse::<usize>() {
                Ok(rows) if rows > 0 => rows,
                _ => return format!("Row count must be a positive number, got `{argument}`."),
            }
        };

        Board::ALL
            .into_iter()
            .map(|board| match self.session.table(board) {
                Some(table) => format!(
                    "## {} ({} rows)\n{}",
                    board.display_name(),
                    table.len(),
                    render_markdown(table, rows)
                ),
                None => format!("## {}\nNot synced yet. Run /sync.", board.display_name()),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn export(&self, argument: &str, now: DateTime<Utc>) -> String {
        if self.session.history().is_empty() {
            return "Nothing to export yet.".to_string();
        }

        let path = if argument.is_empty() {
            PathBuf::from(format!("chat_export_{}.txt", now.format("%Y%m%d_%H%M%S")))
        } else {
            PathBuf::from(argument)
        };

        match fs::write(&path, self.session.export_transcript()) {
            Ok(()) => {
                info!(
                    event_name = "boardsight.chat.exported",
                    correlation_id = %self.session.id().0,
                    messages = self.session.history().len(),
                    path = %path.display(),
                    "chat transcript exported"
                );
                format!(
                    "Exported {} messages to {}",
                    self.session.history().len(),
                    path.display()
                )
            }
            Err(error) => format!("Export failed for {}: {error}", path.display()),
        }
    }
}

fn examples() -> String {
    let mut lines = vec!["Try asking:".to_string()];
    lines.extend(EXAMPLE_QUESTIONS.iter().map(|question| format!("  - {question}")));
    lines.join("\n")
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let connected = match Connected::open(COMMAND, options) {
        Ok(connected) => connected,
        Err(result) => return result,
    };

    let mut chat = ChatSession::new(connected.board_sync, connected.agent, connected.runtime);
    match chat.sync(Utc::now()) {
        Ok(summary) => println!("{summary}\n"),
        Err(message) => return CommandResult::integration_failure(COMMAND, message),
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(error) = chat.run(stdin.lock(), stdout.lock()) {
        return CommandResult::internal(COMMAND, format!("chat terminal error: {error}"));
    }

    CommandResult::success(
        COMMAND,
        format!("chat ended after {} question(s)", chat.questions()),
    )
}
