//! Domain model and normalization core for boardsight.
//!
//! Raw board items come in as [`RawRecord`]s, are cleaned by the
//! [`Normalizer`] against a [`BoardSchema`], and live in a [`SessionContext`]
//! for the rest of the conversation.

pub mod config;
pub mod domain;
pub mod errors;
pub mod metrics;
pub mod normalize;
pub mod session;
pub mod table;

pub use domain::board::Board;
pub use domain::policy::{BoardSchema, ColumnPolicy, ColumnType, NullRule};
pub use domain::record::{CellValue, CleanRow, RawRecord};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use metrics::TableMetrics;
pub use normalize::{
    IssueKind, NormalizationReport, NormalizedTable, Normalizer, ParseOptions, RowIssue,
};
pub use session::{ChatMessage, Role, SessionContext, SessionId};
