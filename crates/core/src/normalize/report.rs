use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnparseableDate,
    UnparseableAmount,
    MissingRequiredField,
}

impl IssueKind {
    pub const ALL: [IssueKind; 3] =
        [Self::UnparseableDate, Self::UnparseableAmount, Self::MissingRequiredField];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnparseableDate => "unparseable_date",
            Self::UnparseableAmount => "unparseable_amount",
            Self::MissingRequiredField => "missing_required_field",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell that could not be taken as-is. `row_index` is the input position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row_index: usize,
    pub column: String,
    pub kind: IssueKind,
    pub raw: Option<String>,
    pub row_dropped: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub issues: Vec<RowIssue>,
    pub unmapped_fields: BTreeSet<String>,
}

impl NormalizationReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_out)
    }

    /// Number of distinct input rows with at least one issue of `kind`.
    pub fn rows_affected(&self, kind: IssueKind) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.kind == kind)
            .map(|issue| issue.row_index)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn affected_by_kind(&self) -> BTreeMap<IssueKind, usize> {
        IssueKind::ALL
            .into_iter()
            .map(|kind| (kind, self.rows_affected(kind)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Human-readable warnings for the calling layer.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .affected_by_kind()
            .into_iter()
            .map(|(kind, count)| format!("{count} row(s) affected by {kind}"))
            .collect();

        if self.rows_dropped() > 0 {
            warnings.push(format!("{} row(s) dropped", self.rows_dropped()));
        }
        if !self.unmapped_fields.is_empty() {
            let fields = self.unmapped_fields.iter().cloned().collect::<Vec<_>>().join(", ");
            warnings.push(format!("unmapped source fields: {fields}"));
        }

        warnings
    }
}
