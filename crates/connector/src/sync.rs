use std::collections::BTreeMap;

use boardsight_core::config::{AppConfig, ConfigError};
use boardsight_core::{
    Board, BoardSchema, IssueKind, NormalizedTable, Normalizer, RawRecord, SessionContext,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::source::{ConnectorError, RecordSource};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no board could be synced: {}", .0.join("; "))]
    AllBoardsFailed(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoardSyncSummary {
    pub board: Board,
    pub fetched: usize,
    pub rows: usize,
    pub dropped: usize,
    pub affected: BTreeMap<IssueKind, usize>,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub synced_at: DateTime<Utc>,
    pub boards: Vec<BoardSyncSummary>,
}

impl SyncOutcome {
    pub fn board(&self, board: Board) -> Option<&BoardSyncSummary> {
        self.boards.iter().find(|summary| summary.board == board)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.boards
            .iter()
            .flat_map(|summary| {
                summary
                    .error
                    .iter()
                    .chain(summary.warnings.iter())
                    .map(move |warning| format!("{}: {warning}", summary.board.display_name()))
            })
            .collect()
    }
}

/// Fetches both boards from a [`RecordSource`] and loads the normalized
/// tables into a session. A board that fails to fetch is loaded empty and
/// reported; the sync only fails when every board does.
pub struct BoardSync<S> {
    source: S,
    normalizer: Normalizer,
    schemas: BTreeMap<Board, BoardSchema>,
    board_ids: BTreeMap<Board, String>,
}

impl<S> BoardSync<S>
where
    S: RecordSource,
{
    pub fn new(
        source: S,
        normalizer: Normalizer,
        schemas: impl IntoIterator<Item = BoardSchema>,
        board_ids: impl IntoIterator<Item = (Board, String)>,
    ) -> Self {
        Self {
            source,
            normalizer,
            schemas: schemas.into_iter().map(|schema| (schema.board, schema)).collect(),
            board_ids: board_ids.into_iter().collect(),
        }
    }

    pub fn from_config(source: S, config: &AppConfig) -> Result<Self, ConfigError> {
        let normalizer = Normalizer::new(config.normalize.parse_options()?);
        let board_ids = Board::ALL
            .into_iter()
            .filter_map(|board| {
                config.monday.board_id(board).ok().map(|id| (board, id.trim().to_string()))
            })
            .collect::<Vec<_>>();
        if board_ids.is_empty() {
            return Err(ConfigError::MissingCredential(
                "at least one of monday.deals_board_id / monday.work_orders_board_id is required"
                    .to_string(),
            ));
        }

        let schemas = Board::ALL.into_iter().map(|board| config.boards.schema(board).clone());
        Ok(Self::new(source, normalizer, schemas, board_ids))
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub async fn sync(
        &self,
        session: &mut SessionContext,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        let correlation_id = session.id().0.to_string();
        info!(
            event_name = "boardsight.sync.start",
            correlation_id = %correlation_id,
            boards = self.board_ids.len(),
            "syncing boards"
        );

        let (deals, work_orders) =
            tokio::join!(self.fetch(Board::Deals), self.fetch(Board::WorkOrders));

        let mut tables = Vec::with_capacity(2);
        let mut summaries = Vec::with_capacity(2);
        let mut failures = Vec::new();

        for (board, fetched) in [(Board::Deals, deals), (Board::WorkOrders, work_orders)] {
            let schema = self.schema(board);
            let (table, summary) = match fetched {
                Ok(records) => {
                    let table = self.normalizer.normalize(&schema, &records);
                    let summary = summarize(&table, records.len());
                    (table, summary)
                }
                Err(error) => {
                    warn!(
                        event_name = "boardsight.sync.board_failed",
                        correlation_id = %correlation_id,
                        board = %board,
                        error = %error,
                        "board fetch failed; loading empty table"
                    );
                    failures.push(format!("{}: {error}", board.display_name()));
                    let table = NormalizedTable::empty(&schema);
                    let mut summary = summarize(&table, 0);
                    summary.error = Some(error.to_string());
                    (table, summary)
                }
            };

            info!(
                event_name = "boardsight.sync.board_loaded",
                correlation_id = %correlation_id,
                board = %board,
                fetched = summary.fetched,
                rows = summary.rows,
                dropped = summary.dropped,
                issues = table.report.issues.len(),
                "board normalized"
            );
            tables.push(table);
            summaries.push(summary);
        }

        if failures.len() == summaries.len() {
            return Err(SyncError::AllBoardsFailed(failures));
        }

        session.load_tables(tables, now);
        info!(
            event_name = "boardsight.sync.completed",
            correlation_id = %correlation_id,
            "boards loaded into session"
        );

        Ok(SyncOutcome { synced_at: now, boards: summaries })
    }

    fn schema(&self, board: Board) -> BoardSchema {
        self.schemas.get(&board).cloned().unwrap_or_else(|| BoardSchema::default_for(board))
    }

    async fn fetch(&self, board: Board) -> Result<Vec<RawRecord>, ConnectorError> {
        match self.board_ids.get(&board) {
            Some(board_id) => self.source.fetch_board(board, board_id).await,
            None => Err(ConnectorError::Config(ConfigError::MissingCredential(format!(
                "no board id configured for {}",
                board.display_name()
            )))),
        }
    }
}

fn summarize(table: &NormalizedTable, fetched: usize) -> BoardSyncSummary {
    BoardSyncSummary {
        board: table.board,
        fetched,
        rows: table.len(),
        dropped: table.report.rows_dropped(),
        affected: table.report.affected_by_kind(),
        warnings: table.report.warnings(),
        error: None,
    }
}
