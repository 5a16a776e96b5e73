use async_trait::async_trait;
use boardsight_core::config::ConfigError;
use boardsight_core::{Board, RawRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("request to board api failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("board api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("board api reported errors: {0}")]
    GraphQl(String),
    #[error("failed to decode board api response: {0}")]
    Decode(String),
    #[error("board `{0}` was not found or is not visible to this token")]
    BoardNotFound(String),
}

/// Anything that can hand back the raw items of a board.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_board(
        &self,
        board: Board,
        board_id: &str,
    ) -> Result<Vec<RawRecord>, ConnectorError>;
}
