use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::board::Board;
use crate::normalize::NormalizedTable;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything one conversation needs: the loaded tables and the chat history.
///
/// Tables are replaced wholesale on every sync; history survives syncs and is
/// only dropped by [`SessionContext::clear_history`].
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    id: SessionId,
    tables: BTreeMap<Board, NormalizedTable>,
    history: Vec<ChatMessage>,
    last_sync: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn load_tables(
        &mut self,
        tables: impl IntoIterator<Item = NormalizedTable>,
        synced_at: DateTime<Utc>,
    ) {
        self.tables = tables.into_iter().map(|table| (table.board, table)).collect();
        self.last_sync = Some(synced_at);
    }

    pub fn table(&self, board: Board) -> Option<&NormalizedTable> {
        self.tables.get(&board)
    }

    pub fn tables(&self) -> impl Iterator<Item = &NormalizedTable> {
        self.tables.values()
    }

    pub fn is_loaded(&self) -> bool {
        self.last_sync.is_some()
    }

    pub fn has_rows(&self) -> bool {
        self.tables.values().any(|table| !table.is_empty())
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) {
        self.history.push(ChatMessage { role, content: content.into(), timestamp });
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Plain-text transcript, one block per turn.
    pub fn export_transcript(&self) -> String {
        self.history
            .iter()
            .map(|message| {
                format!(
                    "{} [{}]:\n{}",
                    message.role.label(),
                    message.timestamp.format("%I:%M %p"),
                    message.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::domain::board::Board;
    use crate::domain::policy::BoardSchema;
    use crate::domain::record::RawRecord;
    use crate::normalize::{NormalizedTable, Normalizer};

    use super::{Role, SessionContext};

    #[test]
    fn sync_replaces_tables_and_keeps_history() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).single().expect("timestamp");
        let mut session = SessionContext::new();
        assert!(!session.is_loaded());

        session.push(Role::User, "hello", at);
        let schema = BoardSchema::default_for(Board::Deals);
        let records = [RawRecord::new().with("Item Name", "Acme")];
        session.load_tables([Normalizer::default().normalize(&schema, &records)], at);

        assert!(session.is_loaded());
        assert!(session.has_rows());
        assert_eq!(session.table(Board::Deals).map(NormalizedTable::len), Some(1));
        assert!(session.table(Board::WorkOrders).is_none());

        session.load_tables([NormalizedTable::empty(&schema)], at);
        assert!(!session.has_rows());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn transcript_labels_turns_with_times() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 14, 5, 0).single().expect("timestamp");
        let mut session = SessionContext::new();
        session.push(Role::User, "Total pipeline?", at);
        session.push(Role::Assistant, "**Answer:** 750", at);

        assert_eq!(
            session.export_transcript(),
            "USER [02:05 PM]:\nTotal pipeline?\n\nASSISTANT [02:05 PM]:\n**Answer:** 750"
        );

        session.clear_history();
        assert!(session.export_transcript().is_empty());
    }
}
