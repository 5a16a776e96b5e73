use boardsight_connector::{BoardSync, ConnectorError, MondayClient, SyncOutcome};
use boardsight_core::config::{AppConfig, LoadOptions};
use boardsight_core::SessionContext;
use chrono::Utc;

use crate::commands::{async_runtime, to_data, CommandResult};

const COMMAND: &str = "sync";

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure(COMMAND, &error),
    };

    let board_sync = match monday_sync(COMMAND, &config) {
        Ok(board_sync) => board_sync,
        Err(result) => return result,
    };
    let runtime = match async_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let mut session = SessionContext::new();
    match runtime.block_on(board_sync.sync(&mut session, Utc::now())) {
        Ok(outcome) => {
            CommandResult::success_with(COMMAND, render_outcome(&outcome), to_data(&outcome))
        }
        Err(error) => CommandResult::integration_failure(COMMAND, error.to_string()),
    }
}

pub(crate) fn monday_sync(
    command: &str,
    config: &AppConfig,
) -> Result<BoardSync<MondayClient>, CommandResult> {
    let client = MondayClient::new(&config.monday).map_err(|error| match error {
        ConnectorError::Config(error) => CommandResult::config_failure(command, &error),
        other => CommandResult::integration_failure(command, other.to_string()),
    })?;

    BoardSync::from_config(client, config)
        .map_err(|error| CommandResult::config_failure(command, &error))
}

/// One line per board plus any warnings, e.g. `Deals: 12 records (1 dropped)`.
pub fn render_outcome(outcome: &SyncOutcome) -> String {
    let mut lines = Vec::new();
    for summary in &outcome.boards {
        let mut line = format!("{}: {} records", summary.board.display_name(), summary.rows);
        if summary.dropped > 0 {
            line.push_str(&format!(" ({} dropped)", summary.dropped));
        }
        lines.push(line);
    }
    lines.extend(outcome.warnings().into_iter().map(|warning| format!("warning: {warning}")));
    lines.push(format!("Last synced: {}", outcome.synced_at.format("%I:%M %p")));
    lines.join("\n")
}
