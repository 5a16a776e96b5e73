//! Raw record fetching for boardsight.
//!
//! - `source` - the [`RecordSource`] seam and its error type
//! - `monday` - GraphQL client for monday.com boards
//! - `sync` - fetch + normalize both boards into a session

pub mod monday;
pub mod source;
pub mod sync;

pub use monday::MondayClient;
pub use source::{ConnectorError, RecordSource};
pub use sync::{BoardSync, BoardSyncSummary, SyncError, SyncOutcome};
