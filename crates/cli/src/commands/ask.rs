use boardsight_agent::{AgentReply, AgentRuntime, ChatCompletionsClient, ReplyOutcome};
use boardsight_connector::{BoardSync, MondayClient, SyncOutcome};
use boardsight_core::config::{AppConfig, LoadOptions};
use boardsight_core::SessionContext;
use chrono::Utc;
use tokio::runtime::Runtime;

use crate::commands::sync::monday_sync;
use crate::commands::{
    async_runtime, to_data, CommandResult, EXIT_BAD_INPUT, EXIT_INTEGRATION, EXIT_INTERNAL,
};

const COMMAND: &str = "ask";

/// Everything a model-backed command needs: a board sync against monday.com,
/// the agent runtime and a tokio runtime to drive both.
pub(crate) struct Connected {
    pub board_sync: BoardSync<MondayClient>,
    pub agent: AgentRuntime<ChatCompletionsClient>,
    pub runtime: Runtime,
}

impl Connected {
    pub(crate) fn open(command: &str, options: &LoadOptions) -> Result<Self, CommandResult> {
        let config = AppConfig::load(options.clone())
            .map_err(|error| CommandResult::config_failure(command, &error))?;
        let llm = ChatCompletionsClient::from_config(&config.llm)
            .map_err(|error| CommandResult::config_failure(command, &error))?;
        let agent = AgentRuntime::from_config(llm, &config.agent)
            .map_err(|error| CommandResult::internal(command, error.to_string()))?;
        let board_sync = monday_sync(command, &config)?;
        let runtime = async_runtime(command)?;

        Ok(Self { board_sync, agent, runtime })
    }

    pub(crate) fn sync(
        &self,
        command: &str,
        session: &mut SessionContext,
    ) -> Result<SyncOutcome, CommandResult> {
        self.runtime
            .block_on(self.board_sync.sync(session, Utc::now()))
            .map_err(|error| CommandResult::integration_failure(command, error.to_string()))
    }
}

pub fn run(options: &LoadOptions, question: &str) -> CommandResult {
    if question.trim().is_empty() {
        return CommandResult::bad_input(COMMAND, "a question is required");
    }

    let connected = match Connected::open(COMMAND, options) {
        Ok(connected) => connected,
        Err(result) => return result,
    };
    let mut session = SessionContext::new();
    if let Err(result) = connected.sync(COMMAND, &mut session) {
        return result;
    }

    let reply = connected.runtime.block_on(connected.agent.ask(&mut session, question, Utc::now()));
    reply_result(COMMAND, &reply)
}

pub(crate) fn reply_result(command: &str, reply: &AgentReply) -> CommandResult {
    match &reply.outcome {
        ReplyOutcome::Answered | ReplyOutcome::SnippetWithheld { .. } => {
            CommandResult::success_with(command, reply.message.clone(), to_data(reply))
        }
        ReplyOutcome::Declined { .. } => CommandResult::failure_with(
            command,
            "bad_input",
            reply.message.clone(),
            EXIT_BAD_INPUT,
            to_data(reply),
        ),
        ReplyOutcome::Failed { error_class: "integration" } => CommandResult::failure_with(
            command,
            "integration",
            reply.message.clone(),
            EXIT_INTEGRATION,
            to_data(reply),
        ),
        ReplyOutcome::Failed { error_class } => CommandResult::failure_with(
            command,
            error_class,
            reply.message.clone(),
            EXIT_INTERNAL,
            to_data(reply),
        ),
    }
}
