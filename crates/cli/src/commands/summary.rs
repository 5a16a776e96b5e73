use boardsight_core::config::LoadOptions;
use boardsight_core::SessionContext;
use chrono::Utc;

use crate::commands::ask::{reply_result, Connected};
use crate::commands::CommandResult;

const COMMAND: &str = "summary";

pub fn run(options: &LoadOptions) -> CommandResult {
    let connected = match Connected::open(COMMAND, options) {
        Ok(connected) => connected,
        Err(result) => return result,
    };
    let mut session = SessionContext::new();
    if let Err(result) = connected.sync(COMMAND, &mut session) {
        return result;
    }

    let reply = connected.runtime.block_on(connected.agent.executive_summary(&mut session, Utc::now()));
    reply_result(COMMAND, &reply)
}
