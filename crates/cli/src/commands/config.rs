use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use boardsight_core::config::{detect_config_path, AppConfig, LoadOptions};
use boardsight_core::Board;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::CommandResult;

const COMMAND: &str = "config";

struct Attribution {
    doc: Option<Value>,
    path: Option<PathBuf>,
}

impl Attribution {
    fn load(options: &LoadOptions) -> Self {
        let path = match &options.config_path {
            Some(path) => path.exists().then(|| path.clone()),
            None => detect_config_path(),
        };
        let doc = load_config_file_doc(path.as_deref());
        Self { doc, path }
    }

    fn line(&self, key_path: &str, value: &str, env_keys: &[&str]) -> String {
        format!("- {key_path} = {value} (source: {})", self.source(key_path, env_keys))
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure(COMMAND, &error),
    };

    CommandResult::success(COMMAND, render(&config, &Attribution::load(options)))
}

fn render(config: &AppConfig, sources: &Attribution) -> String {
    let monday = &config.monday;
    let llm = &config.llm;
    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(sources.line(
        "monday.api_key",
        &redact_secret(monday.api_key.as_ref()),
        &["BOARDSIGHT_MONDAY_API_KEY", "MONDAY_API_KEY"],
    ));
    lines.push(sources.line("monday.api_url", &monday.api_url, &["BOARDSIGHT_MONDAY_API_URL"]));
    lines.push(sources.line(
        "monday.api_version",
        &monday.api_version,
        &["BOARDSIGHT_MONDAY_API_VERSION"],
    ));
    lines.push(sources.line(
        "monday.deals_board_id",
        monday.deals_board_id.as_deref().unwrap_or("<unset>"),
        &["BOARDSIGHT_MONDAY_DEALS_BOARD_ID", "DEALS_ID"],
    ));
    lines.push(sources.line(
        "monday.work_orders_board_id",
        monday.work_orders_board_id.as_deref().unwrap_or("<unset>"),
        &["BOARDSIGHT_MONDAY_WORK_ORDERS_BOARD_ID", "WORK_ORDERS_ID"],
    ));
    lines.push(sources.line(
        "monday.page_limit",
        &monday.page_limit.to_string(),
        &["BOARDSIGHT_MONDAY_PAGE_LIMIT"],
    ));
    lines.push(sources.line(
        "monday.max_pages",
        &monday.max_pages.to_string(),
        &["BOARDSIGHT_MONDAY_MAX_PAGES"],
    ));

    lines.push(sources.line(
        "llm.provider",
        &format!("{:?}", llm.provider),
        &["BOARDSIGHT_LLM_PROVIDER"],
    ));
    lines.push(sources.line("llm.model", &llm.model, &["BOARDSIGHT_LLM_MODEL"]));
    lines.push(sources.line("llm.base_url", llm.base_url(), &["BOARDSIGHT_LLM_BASE_URL"]));
    lines.push(sources.line(
        "llm.api_key",
        &redact_secret(llm.api_key.as_ref()),
        &["BOARDSIGHT_LLM_API_KEY", "OPENROUTER_API_KEY"],
    ));
    lines.push(sources.line(
        "llm.timeout_secs",
        &llm.timeout_secs.to_string(),
        &["BOARDSIGHT_LLM_TIMEOUT_SECS"],
    ));
    lines.push(sources.line(
        "llm.max_retries",
        &llm.max_retries.to_string(),
        &["BOARDSIGHT_LLM_MAX_RETRIES"],
    ));

    lines.push(sources.line(
        "normalize.date_formats",
        &config.normalize.date_formats.join(", "),
        &[],
    ));
    lines.push(sources.line(
        "agent.sample_rows",
        &config.agent.sample_rows.to_string(),
        &["BOARDSIGHT_AGENT_SAMPLE_ROWS"],
    ));
    for board in Board::ALL {
        let columns = config.boards.schema(board).column_names().collect::<Vec<_>>().join(", ");
        lines.push(sources.line(&format!("boards.{}.columns", board.as_str()), &columns, &[]));
    }

    lines.push(sources.line(
        "logging.level",
        &config.logging.level,
        &["BOARDSIGHT_LOGGING_LEVEL", "BOARDSIGHT_LOG_LEVEL"],
    ));
    lines.push(sources.line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["BOARDSIGHT_LOGGING_FORMAT", "BOARDSIGHT_LOG_FORMAT"],
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret.map(|secret| secret.expose_secret().trim()) {
        None => "<unset>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_are_never_echoed() {
        let key = SecretString::from("eyJhbGciOiJIUzI1NiJ9.secret".to_string());
        assert_eq!(redact_secret(Some(&key)), "<redacted>");
        assert_eq!(redact_secret(Some(&SecretString::from(" ".to_string()))), "<empty>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn nested_keys_are_found_in_file_doc() {
        let doc: Value = "[monday]\ndeals_board_id = \"1\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "monday.deals_board_id"));
        assert!(!contains_path(&doc, "monday.api_key"));
        assert!(!contains_path(&doc, "llm.model"));
    }
}
