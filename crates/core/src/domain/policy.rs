use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::board::Board;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Date,
    Decimal,
    Text,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Decimal => "decimal",
            Self::Text => "text",
        }
    }
}

/// What a column does when its value is missing or cannot be parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullRule {
    DropRow,
    SubstituteZero,
    SubstituteEmptyText,
    LeaveMissing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPolicy {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub null_rule: NullRule,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ColumnPolicy {
    pub fn new(name: impl Into<String>, column_type: ColumnType, null_rule: NullRule) -> Self {
        Self { name: name.into(), column_type, null_rule, aliases: Vec::new() }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Raw field names this column reads from, canonical name first.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidColumnPolicy {
                column: self.name.clone(),
                reason: "column name must not be empty".to_string(),
            });
        }

        let compatible = match self.null_rule {
            NullRule::SubstituteZero => self.column_type == ColumnType::Decimal,
            NullRule::SubstituteEmptyText => self.column_type == ColumnType::Text,
            NullRule::DropRow | NullRule::LeaveMissing => true,
        };
        if !compatible {
            return Err(DomainError::InvalidColumnPolicy {
                column: self.name.clone(),
                reason: format!(
                    "null rule {:?} cannot be applied to a {} column",
                    self.null_rule,
                    self.column_type.as_str()
                ),
            });
        }

        Ok(())
    }
}

/// The ordered column policy set for one board.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSchema {
    pub board: Board,
    pub columns: Vec<ColumnPolicy>,
}

impl BoardSchema {
    pub fn new(board: Board, columns: Vec<ColumnPolicy>) -> Result<Self, DomainError> {
        let schema = Self { board, columns };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.columns.is_empty() {
            return Err(DomainError::InvariantViolation(format!(
                "board `{}` must define at least one column",
                self.board
            )));
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            column.validate()?;
            if !seen.insert(column.name.trim().to_ascii_lowercase()) {
                return Err(DomainError::DuplicateColumn {
                    board: self.board,
                    column: column.name.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnPolicy> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Built-in schema for a board, matching the column titles the boards ship with.
    pub fn default_for(board: Board) -> Self {
        use ColumnType::{Date, Decimal, Text};
        use NullRule::{DropRow, LeaveMissing, SubstituteEmptyText, SubstituteZero};

        let columns = match board {
            Board::Deals => vec![
                ColumnPolicy::new("Item Name", Text, DropRow).with_aliases(["Name", "Deal Name"]),
                ColumnPolicy::new("Owner", Text, SubstituteEmptyText)
                    .with_aliases(["Owner code", "Deal Owner"]),
                ColumnPolicy::new("Stage", Text, SubstituteEmptyText)
                    .with_aliases(["Deal Stage", "Status", "Deal Status"]),
                ColumnPolicy::new("Sector", Text, SubstituteEmptyText)
                    .with_aliases(["Sector/service", "Industry"]),
                ColumnPolicy::new("Deal Value", Decimal, SubstituteZero)
                    .with_aliases(["Masked Deal value", "Value", "Amount", "Deal Amount"]),
                ColumnPolicy::new("Probability", Text, SubstituteEmptyText)
                    .with_aliases(["Closure Probability"]),
                ColumnPolicy::new("Close Date", Date, LeaveMissing)
                    .with_aliases(["Tentative Close Date", "Expected Close Date", "Close Date (A)"]),
                ColumnPolicy::new("Created Date", Date, LeaveMissing)
                    .with_aliases(["Created", "Creation Date"]),
            ],
            Board::WorkOrders => vec![
                ColumnPolicy::new("Item Name", Text, DropRow)
                    .with_aliases(["Name", "Work Order", "Deal name masked"]),
                ColumnPolicy::new("Customer", Text, SubstituteEmptyText)
                    .with_aliases(["Customer Name Code", "Client"]),
                ColumnPolicy::new("Status", Text, SubstituteEmptyText)
                    .with_aliases(["Execution Status", "WO Status"]),
                ColumnPolicy::new("Sector", Text, SubstituteEmptyText)
                    .with_aliases(["Sector/service", "Industry"]),
                ColumnPolicy::new("Order Value", Decimal, SubstituteZero).with_aliases([
                    "Amount in Rupees (Excl of GST) (Masked)",
                    "Amount",
                    "Value",
                ]),
                ColumnPolicy::new("Billed Value", Decimal, SubstituteZero)
                    .with_aliases(["Billed Value in Rupees (Excl of GST.) (Masked)", "Billed"]),
                ColumnPolicy::new("Collected Amount", Decimal, SubstituteZero)
                    .with_aliases(["Collected Amount in Rupees (Incl of GST.) (Masked)"]),
                ColumnPolicy::new("Start Date", Date, LeaveMissing)
                    .with_aliases(["Probable Start Date", "Data Delivery Date"]),
                ColumnPolicy::new("Due Date", Date, LeaveMissing)
                    .with_aliases(["Probable End Date", "End Date"]),
            ],
        };

        Self { board, columns }
    }
}
