use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::board::Board;
use crate::domain::policy::{BoardSchema, ColumnPolicy};
use crate::normalize::{
    ParseOptions, DEFAULT_CURRENCY_SYMBOLS, DEFAULT_DATE_PATTERNS, DEFAULT_MISSING_SENTINELS,
};

pub const DEFAULT_CONFIG_FILE: &str = "boardsight.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub monday: MondayConfig,
    pub llm: LlmConfig,
    pub normalize: NormalizeConfig,
    pub agent: AgentConfig,
    pub boards: BoardsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct MondayConfig {
    pub api_key: Option<SecretString>,
    pub api_url: String,
    pub api_version: String,
    pub deals_board_id: Option<String>,
    pub work_orders_board_id: Option<String>,
    pub page_limit: u32,
    pub max_pages: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub app_title: Option<String>,
    pub referer: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NormalizeConfig {
    pub date_formats: Vec<String>,
    pub currency_symbols: String,
    pub missing_sentinels: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub sample_rows: usize,
    pub max_question_chars: usize,
}

#[derive(Clone, Debug)]
pub struct BoardsConfig {
    pub deals: BoardSchema,
    pub work_orders: BoardSchema,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenRouter,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub monday_api_key: Option<String>,
    pub deals_board_id: Option<String>,
    pub work_orders_board_id: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
    #[error("missing credential: {0}")]
    MissingCredential(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            monday: MondayConfig {
                api_key: None,
                api_url: "https://api.monday.com/v2".to_string(),
                api_version: "2023-10".to_string(),
                deals_board_id: None,
                work_orders_board_id: None,
                page_limit: 500,
                max_pages: 20,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenRouter,
                api_key: None,
                base_url: None,
                model: "openai/gpt-oss-120b".to_string(),
                timeout_secs: 60,
                max_retries: 2,
                app_title: Some("Boardsight".to_string()),
                referer: None,
            },
            normalize: NormalizeConfig {
                date_formats: DEFAULT_DATE_PATTERNS.iter().map(|s| s.to_string()).collect(),
                currency_symbols: DEFAULT_CURRENCY_SYMBOLS.to_string(),
                missing_sentinels: DEFAULT_MISSING_SENTINELS.iter().map(|s| s.to_string()).collect(),
            },
            agent: AgentConfig { sample_rows: 3, max_question_chars: 2000 },
            boards: BoardsConfig {
                deals: BoardSchema::default_for(Board::Deals),
                work_orders: BoardSchema::default_for(Board::WorkOrders),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openrouter|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl MondayConfig {
    pub fn require_api_key(&self) -> Result<&SecretString, ConfigError> {
        self.api_key.as_ref().filter(|key| !key.expose_secret().trim().is_empty()).ok_or_else(
            || {
                ConfigError::MissingCredential(
                    "monday.api_key is required. Create one under monday.com > Avatar > Developers > My access tokens"
                        .to_string(),
                )
            },
        )
    }

    pub fn board_id(&self, board: Board) -> Result<&str, ConfigError> {
        let (key, value) = match board {
            Board::Deals => ("monday.deals_board_id", &self.deals_board_id),
            Board::WorkOrders => ("monday.work_orders_board_id", &self.work_orders_board_id),
        };
        value
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredential(format!("{key} is required")))
    }
}

impl LlmConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_else(|| self.provider.default_base_url())
    }

    /// `Ok(None)` for providers that run without a key.
    pub fn require_api_key(&self) -> Result<Option<&SecretString>, ConfigError> {
        let key = self.api_key.as_ref().filter(|key| !key.expose_secret().trim().is_empty());
        match key {
            Some(key) => Ok(Some(key)),
            None if self.provider.requires_api_key() => Err(ConfigError::MissingCredential(
                "llm.api_key is required for openrouter/openai providers".to_string(),
            )),
            None => Ok(None),
        }
    }
}

impl NormalizeConfig {
    pub fn parse_options(&self) -> Result<ParseOptions, ConfigError> {
        ParseOptions::new(&self.date_formats, &self.currency_symbols, &self.missing_sentinels)
            .map_err(|error| ConfigError::Validation(format!("normalize: {error}")))
    }
}

impl BoardsConfig {
    pub fn schema(&self, board: Board) -> &BoardSchema {
        match board {
            Board::Deals => &self.deals,
            Board::WorkOrders => &self.work_orders,
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(monday) = patch.monday {
            if let Some(monday_api_key_value) = monday.api_key {
                self.monday.api_key = Some(secret_value(monday_api_key_value));
            }
            if let Some(api_url) = monday.api_url {
                self.monday.api_url = api_url;
            }
            if let Some(api_version) = monday.api_version {
                self.monday.api_version = api_version;
            }
            if let Some(deals_board_id) = monday.deals_board_id {
                self.monday.deals_board_id = Some(deals_board_id);
            }
            if let Some(work_orders_board_id) = monday.work_orders_board_id {
                self.monday.work_orders_board_id = Some(work_orders_board_id);
            }
            if let Some(page_limit) = monday.page_limit {
                self.monday.page_limit = page_limit;
            }
            if let Some(max_pages) = monday.max_pages {
                self.monday.max_pages = max_pages;
            }
            if let Some(timeout_secs) = monday.timeout_secs {
                self.monday.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(app_title) = llm.app_title {
                self.llm.app_title = Some(app_title);
            }
            if let Some(referer) = llm.referer {
                self.llm.referer = Some(referer);
            }
        }

        if let Some(normalize) = patch.normalize {
            if let Some(date_formats) = normalize.date_formats {
                self.normalize.date_formats = date_formats;
            }
            if let Some(currency_symbols) = normalize.currency_symbols {
                self.normalize.currency_symbols = currency_symbols;
            }
            if let Some(missing_sentinels) = normalize.missing_sentinels {
                self.normalize.missing_sentinels = missing_sentinels;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(sample_rows) = agent.sample_rows {
                self.agent.sample_rows = sample_rows;
            }
            if let Some(max_question_chars) = agent.max_question_chars {
                self.agent.max_question_chars = max_question_chars;
            }
        }

        if let Some(boards) = patch.boards {
            if let Some(columns) = boards.deals.and_then(|board| board.columns) {
                self.boards.deals = BoardSchema { board: Board::Deals, columns };
            }
            if let Some(columns) = boards.work_orders.and_then(|board| board.columns) {
                self.boards.work_orders = BoardSchema { board: Board::WorkOrders, columns };
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let monday_key =
            read_env("BOARDSIGHT_MONDAY_API_KEY").or_else(|| read_env("MONDAY_API_KEY"));
        if let Some(value) = monday_key {
            self.monday.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BOARDSIGHT_MONDAY_API_URL") {
            self.monday.api_url = value;
        }
        if let Some(value) = read_env("BOARDSIGHT_MONDAY_API_VERSION") {
            self.monday.api_version = value;
        }
        let deals_id =
            read_env("BOARDSIGHT_MONDAY_DEALS_BOARD_ID").or_else(|| read_env("DEALS_ID"));
        if let Some(value) = deals_id {
            self.monday.deals_board_id = Some(value);
        }
        let orders_id = read_env("BOARDSIGHT_MONDAY_WORK_ORDERS_BOARD_ID")
            .or_else(|| read_env("WORK_ORDERS_ID"));
        if let Some(value) = orders_id {
            self.monday.work_orders_board_id = Some(value);
        }
        if let Some(value) = read_env("BOARDSIGHT_MONDAY_PAGE_LIMIT") {
            self.monday.page_limit = parse_u32("BOARDSIGHT_MONDAY_PAGE_LIMIT", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_MONDAY_MAX_PAGES") {
            self.monday.max_pages = parse_u32("BOARDSIGHT_MONDAY_MAX_PAGES", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_MONDAY_TIMEOUT_SECS") {
            self.monday.timeout_secs = parse_u64("BOARDSIGHT_MONDAY_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BOARDSIGHT_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        let llm_key = read_env("BOARDSIGHT_LLM_API_KEY").or_else(|| read_env("OPENROUTER_API_KEY"));
        if let Some(value) = llm_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("BOARDSIGHT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BOARDSIGHT_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("BOARDSIGHT_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("BOARDSIGHT_AGENT_SAMPLE_ROWS") {
            self.agent.sample_rows = parse_usize("BOARDSIGHT_AGENT_SAMPLE_ROWS", &value)?;
        }

        let log_level =
            read_env("BOARDSIGHT_LOGGING_LEVEL").or_else(|| read_env("BOARDSIGHT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BOARDSIGHT_LOGGING_FORMAT").or_else(|| read_env("BOARDSIGHT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(monday_api_key) = overrides.monday_api_key {
            self.monday.api_key = Some(secret_value(monday_api_key));
        }
        if let Some(deals_board_id) = overrides.deals_board_id {
            self.monday.deals_board_id = Some(deals_board_id);
        }
        if let Some(work_orders_board_id) = overrides.work_orders_board_id {
            self.monday.work_orders_board_id = Some(work_orders_board_id);
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_monday(&self.monday)?;
        validate_llm(&self.llm)?;
        self.normalize.parse_options()?;
        validate_agent(&self.agent)?;
        validate_boards(&self.boards)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

pub fn detect_config_path() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{key} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_monday(monday: &MondayConfig) -> Result<(), ConfigError> {
    validate_http_url("monday.api_url", monday.api_url.trim())?;

    if monday.api_version.trim().is_empty() {
        return Err(ConfigError::Validation("monday.api_version must not be empty".to_string()));
    }

    for (key, id) in [
        ("monday.deals_board_id", &monday.deals_board_id),
        ("monday.work_orders_board_id", &monday.work_orders_board_id),
    ] {
        if let Some(id) = id {
            let id = id.trim();
            if id.is_empty() || !id.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be the numeric board id from the board URL (got `{id}`)"
                )));
            }
        }
    }

    if monday.page_limit == 0 || monday.page_limit > 500 {
        return Err(ConfigError::Validation(
            "monday.page_limit must be in range 1..=500".to_string(),
        ));
    }

    if monday.max_pages == 0 {
        return Err(ConfigError::Validation(
            "monday.max_pages must be greater than zero".to_string(),
        ));
    }

    if monday.timeout_secs == 0 || monday.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "monday.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    validate_http_url("llm.base_url", llm.base_url().trim())?;

    if let Some(referer) = &llm.referer {
        validate_http_url("llm.referer", referer.trim())?;
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.sample_rows > 50 {
        return Err(ConfigError::Validation("agent.sample_rows must be at most 50".to_string()));
    }

    if agent.max_question_chars == 0 {
        return Err(ConfigError::Validation(
            "agent.max_question_chars must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_boards(boards: &BoardsConfig) -> Result<(), ConfigError> {
    for board in Board::ALL {
        boards
            .schema(board)
            .validate()
            .map_err(|error| ConfigError::Validation(format!("boards.{board}: {error}")))?;
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    monday: Option<MondayPatch>,
    llm: Option<LlmPatch>,
    normalize: Option<NormalizePatch>,
    agent: Option<AgentPatch>,
    boards: Option<BoardsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct MondayPatch {
    api_key: Option<String>,
    api_url: Option<String>,
    api_version: Option<String>,
    deals_board_id: Option<String>,
    work_orders_board_id: Option<String>,
    page_limit: Option<u32>,
    max_pages: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    app_title: Option<String>,
    referer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NormalizePatch {
    date_formats: Option<Vec<String>>,
    currency_symbols: Option<String>,
    missing_sentinels: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    sample_rows: Option<usize>,
    max_question_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct BoardsPatch {
    deals: Option<BoardPatch>,
    work_orders: Option<BoardPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BoardPatch {
    columns: Option<Vec<ColumnPolicy>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use crate::domain::board::Board;
    use crate::domain::policy::{ColumnType, NullRule};

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const MANAGED_VARS: [&str; 8] = [
        "BOARDSIGHT_MONDAY_API_KEY",
        "MONDAY_API_KEY",
        "BOARDSIGHT_MONDAY_DEALS_BOARD_ID",
        "DEALS_ID",
        "BOARDSIGHT_LLM_API_KEY",
        "OPENROUTER_API_KEY",
        "BOARDSIGHT_LOG_LEVEL",
        "BOARDSIGHT_LOG_FORMAT",
    ];

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_credentials() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.monday.api_key.is_none(), "monday key should default to none")?;
        ensure(
            matches!(config.llm.provider, LlmProvider::OpenRouter),
            "default provider should be openrouter",
        )?;
        ensure(
            config.llm.base_url() == "https://openrouter.ai/api/v1",
            "base url should fall back to the provider default",
        )?;
        ensure(
            matches!(config.llm.require_api_key(), Err(ConfigError::MissingCredential(_))),
            "llm key should be reported as missing when needed",
        )?;
        ensure(
            matches!(config.monday.board_id(Board::Deals), Err(ConfigError::MissingCredential(_))),
            "deals board id should be reported as missing when needed",
        )?;
        ensure(config.normalize.parse_options().is_ok(), "default parse options should build")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("TEST_MONDAY_TOKEN", "monday-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("boardsight.toml");
            fs::write(
                &path,
                r#"
[monday]
api_key = "${TEST_MONDAY_TOKEN}"
deals_board_id = "1234567890"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            let key = config.monday.require_api_key().map_err(|err| err.to_string())?;
            ensure(key.expose_secret() == "monday-from-env", "key should come from env")?;
            ensure(
                config.monday.board_id(Board::Deals).ok() == Some("1234567890"),
                "deals board id should be loaded from file",
            )
        })();

        clear_vars(&["TEST_MONDAY_TOKEN"]);
        result
    }

    #[test]
    fn example_config_file_loads() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let example = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../config/boardsight.example.toml");
        let vars = [
            ("MONDAY_API_KEY", "monday-example"),
            ("DEALS_ID", "111"),
            ("WORK_ORDERS_ID", "222"),
            ("OPENROUTER_API_KEY", "sk-or-example"),
        ];
        for (var, value) in vars {
            env::set_var(var, value);
        }

        let result = AppConfig::load(LoadOptions {
            config_path: Some(example),
            require_file: true,
            ..LoadOptions::default()
        })
        .map_err(|err| format!("example config should load: {err}"))
        .and_then(|config| {
            ensure(config.monday.board_id(Board::WorkOrders).ok() == Some("222"), "orders id")?;
            ensure(config.llm.require_api_key().ok().flatten().is_some(), "llm key")?;
            ensure(config.normalize.date_formats.len() == 5, "date formats")?;
            ensure(config.agent.sample_rows == 3, "sample rows")
        });

        clear_vars(&["WORK_ORDERS_ID"]);
        clear_vars(&MANAGED_VARS);
        result
    }

    #[test]
    fn legacy_secret_names_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("MONDAY_API_KEY", "legacy-monday");
        env::set_var("OPENROUTER_API_KEY", "legacy-openrouter");
        env::set_var("DEALS_ID", "42");
        env::set_var("BOARDSIGHT_LOG_LEVEL", "warn");
        env::set_var("BOARDSIGHT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.monday.api_key.as_ref().map(|k| k.expose_secret() == "legacy-monday")
                    == Some(true),
                "MONDAY_API_KEY should be honored",
            )?;
            ensure(
                config.llm.api_key.as_ref().map(|k| k.expose_secret() == "legacy-openrouter")
                    == Some(true),
                "OPENROUTER_API_KEY should be honored",
            )?;
            ensure(config.monday.deals_board_id.as_deref() == Some("42"), "DEALS_ID honored")?;
            ensure(config.logging.level == "warn", "log level alias should apply")?;
            ensure(matches!(config.logging.format, LogFormat::Pretty), "log format alias")
        })();

        clear_vars(&MANAGED_VARS);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("BOARDSIGHT_MONDAY_DEALS_BOARD_ID", "200");
        env::set_var("BOARDSIGHT_LLM_API_KEY", "llm-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("boardsight.toml");
            fs::write(
                &path,
                r#"
[monday]
deals_board_id = "100"
work_orders_board_id = "101"

[llm]
api_key = "llm-from-file"
model = "from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    llm_model: Some("from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.model == "from-override", "override model should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.monday.deals_board_id.as_deref() == Some("200"),
                "env board id should win over file",
            )?;
            ensure(
                config.monday.work_orders_board_id.as_deref() == Some("101"),
                "file board id should win over defaults",
            )?;
            ensure(
                config.llm.api_key.as_ref().map(|k| k.expose_secret() == "llm-from-env")
                    == Some(true),
                "env api key should win over file",
            )
        })();

        clear_vars(&MANAGED_VARS);
        result
    }

    #[test]
    fn board_schema_can_be_replaced_from_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("boardsight.toml");
        fs::write(
            &path,
            r#"
[normalize]
date_formats = ["DD.MM.YYYY"]

[[boards.deals.columns]]
name = "Deal"
type = "text"
null_rule = "drop_row"

[[boards.deals.columns]]
name = "Value"
type = "decimal"
null_rule = "substitute_zero"
aliases = ["Amount (EUR)"]
"#,
        )
        .map_err(|err| err.to_string())?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        let deals = config.boards.schema(Board::Deals);
        ensure(deals.columns.len() == 2, "deals schema should be replaced")?;
        ensure(deals.columns[1].column_type == ColumnType::Decimal, "value is decimal")?;
        ensure(deals.columns[1].null_rule == NullRule::SubstituteZero, "value substitutes zero")?;
        ensure(deals.columns[1].aliases == vec!["Amount (EUR)".to_string()], "aliases load")?;
        ensure(
            config.boards.schema(Board::WorkOrders).columns.len() > 2,
            "work orders keep the default schema",
        )?;
        ensure(config.normalize.date_formats == vec!["DD.MM.YYYY".to_string()], "formats load")
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        env::set_var("BOARDSIGHT_MONDAY_DEALS_BOARD_ID", "https://acme.monday.com/boards/12");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("monday.deals_board_id")
            );
            ensure(has_message, "validation failure should mention monday.deals_board_id")
        })();

        clear_vars(&MANAGED_VARS);
        result
    }

    #[test]
    fn invalid_schema_in_file_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("boardsight.toml");
        fs::write(
            &path,
            r#"
[[boards.work_orders.columns]]
name = "Due Date"
type = "date"
null_rule = "substitute_zero"
"#,
        )
        .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected schema validation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(error, ConfigError::Validation(ref m) if m.contains("boards.work_orders")),
            "schema failure should name the board",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&MANAGED_VARS);

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                monday_api_key: Some("monday-secret-value".to_string()),
                llm_api_key: Some("llm-secret-value".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;
        let debug = format!("{config:?}");

        ensure(!debug.contains("monday-secret-value"), "debug should not contain monday key")?;
        ensure(!debug.contains("llm-secret-value"), "debug should not contain llm key")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }
}
