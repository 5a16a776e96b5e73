pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use boardsight_core::config::{AppConfig, LoadOptions};
use boardsight_core::Board;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "boardsight",
    about = "Ask questions about your monday.com deals and work orders",
    long_about = "Sync the Deals and Work Orders boards from monday.com, clean them into typed tables and ask questions about them in natural language.",
    after_help = "Examples:\n  boardsight doctor --json\n  boardsight normalize --board deals --input deals.json\n  boardsight ask \"What's the total value of all deals?\"\n  boardsight chat"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to the config file (default: boardsight.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Fetch and normalize both boards, then print counts and warnings")]
    Sync,
    #[command(about = "Normalize a JSON array of raw records offline")]
    Normalize {
        #[arg(long, help = "Board schema to apply (deals|work_orders)")]
        board: Board,
        #[arg(long, help = "JSON file holding an array of raw records")]
        input: PathBuf,
    },
    #[command(about = "Sync, then answer a single question")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "The question to ask")]
        question: Vec<String>,
    },
    #[command(about = "Sync, then produce an executive summary of both boards")]
    Summary,
    #[command(about = "Sync, then start an interactive chat on stdin")]
    Chat,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credentials and board ids without network calls")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config.clone(), ..LoadOptions::default() };

    if let Ok(config) = AppConfig::load(options.clone()) {
        logging::init(&config.logging);
    }

    let result = match cli.command {
        Command::Sync => commands::sync::run(&options),
        Command::Normalize { board, input } => commands::normalize::run(&options, board, &input),
        Command::Ask { question } => commands::ask::run(&options, &question.join(" ")),
        Command::Summary => commands::summary::run(&options),
        Command::Chat => commands::chat::run(&options),
        Command::Config => commands::config::run(&options),
        Command::Doctor { json } => commands::doctor::run(&options, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
