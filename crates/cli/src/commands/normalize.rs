use std::fs;
use std::path::Path;

use boardsight_core::config::{AppConfig, LoadOptions};
use boardsight_core::{Board, NormalizedTable, Normalizer, RawRecord};

use crate::commands::{to_data, CommandResult};

const COMMAND: &str = "normalize";

/// Offline normalization of a JSON array of raw records. Needs no
/// credentials; only the parse options and board schemas are read from
/// config.
pub fn run(options: &LoadOptions, board: Board, input: &Path) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure(COMMAND, &error),
    };
    let parse_options = match config.normalize.parse_options() {
        Ok(parse_options) => parse_options,
        Err(error) => return CommandResult::config_failure(COMMAND, &error),
    };

    let records = match read_records(input) {
        Ok(records) => records,
        Err(message) => return CommandResult::bad_input(COMMAND, message),
    };

    let table = Normalizer::new(parse_options).normalize(config.boards.schema(board), &records);
    CommandResult::success_with(COMMAND, summarize(&table), to_data(&table))
}

fn read_records(input: &Path) -> Result<Vec<RawRecord>, String> {
    let raw = fs::read_to_string(input)
        .map_err(|error| format!("could not read `{}`: {error}", input.display()))?;
    serde_json::from_str::<Vec<RawRecord>>(&raw).map_err(|error| {
        format!("`{}` must be a JSON array of objects: {error}", input.display())
    })
}

fn summarize(table: &NormalizedTable) -> String {
    let report = &table.report;
    let mut message = format!(
        "normalized {} of {} {} records",
        report.rows_out,
        report.rows_in,
        table.board.display_name()
    );
    if report.rows_dropped() > 0 {
        message.push_str(&format!("; {} dropped", report.rows_dropped()));
    }
    for warning in report.warnings() {
        message.push_str(&format!("\nwarning: {warning}"));
    }
    message
}
