//! Raw board records → typed rows.
//!
//! Every column of a [`BoardSchema`] is resolved independently per record.
//! Cell failures are row-scoped: they are recorded in the
//! [`NormalizationReport`] and resolved through the column's [`NullRule`];
//! nothing here aborts a batch.

pub mod amount;
pub mod date;
pub mod report;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::domain::board::Board;
use crate::domain::policy::{BoardSchema, ColumnPolicy, ColumnType, NullRule};
use crate::domain::record::{CellValue, CleanRow, RawRecord};
use crate::errors::DomainError;

pub use amount::{parse_amount, DEFAULT_CURRENCY_SYMBOLS};
pub use date::{parse_date, DatePattern, DEFAULT_DATE_PATTERNS};
pub use report::{IssueKind, NormalizationReport, RowIssue};

pub const DEFAULT_MISSING_SENTINELS: [&str; 6] = ["N/A", "NA", "-", "--", "null", "none"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    date_patterns: Vec<DatePattern>,
    currency_symbols: Vec<char>,
    missing_sentinels: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            date_patterns: DEFAULT_DATE_PATTERNS
                .iter()
                .filter_map(|pattern| DatePattern::parse(pattern).ok())
                .collect(),
            currency_symbols: DEFAULT_CURRENCY_SYMBOLS.chars().collect(),
            missing_sentinels: DEFAULT_MISSING_SENTINELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ParseOptions {
    pub fn new<D, S>(
        date_formats: D,
        currency_symbols: &str,
        missing_sentinels: S,
    ) -> Result<Self, DomainError>
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let date_patterns = date_formats
            .into_iter()
            .map(|pattern| DatePattern::parse(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if date_patterns.is_empty() {
            return Err(DomainError::InvariantViolation(
                "at least one date pattern must be configured".to_string(),
            ));
        }

        Ok(Self {
            date_patterns,
            currency_symbols: currency_symbols.chars().filter(|ch| !ch.is_whitespace()).collect(),
            missing_sentinels: missing_sentinels
                .into_iter()
                .map(|sentinel| sentinel.as_ref().trim().to_string())
                .filter(|sentinel| !sentinel.is_empty())
                .collect(),
        })
    }

    pub fn date_patterns(&self) -> &[DatePattern] {
        &self.date_patterns
    }

    pub fn currency_symbols(&self) -> &[char] {
        &self.currency_symbols
    }

    pub fn missing_sentinels(&self) -> &[String] {
        &self.missing_sentinels
    }

    fn is_sentinel(&self, text: &str) -> bool {
        self.missing_sentinels.iter().any(|sentinel| sentinel.eq_ignore_ascii_case(text))
    }
}

/// A board's rows after normalization, plus what it took to get there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NormalizedTable {
    pub board: Board,
    pub columns: Vec<ColumnPolicy>,
    pub rows: Vec<CleanRow>,
    pub report: NormalizationReport,
}

impl NormalizedTable {
    pub fn empty(schema: &BoardSchema) -> Self {
        Self {
            board: schema.board,
            columns: schema.columns.clone(),
            rows: Vec::new(),
            report: NormalizationReport::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a CellValue> + 'a {
        self.rows.iter().filter_map(move |row| row.get(column))
    }
}

enum Cell {
    Value(CellValue),
    Missing,
    Unparseable(IssueKind, String),
}

#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    options: ParseOptions,
}

impl Normalizer {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn normalize(&self, schema: &BoardSchema, records: &[RawRecord]) -> NormalizedTable {
        let mut report = NormalizationReport { rows_in: records.len(), ..Default::default() };
        let mut rows = Vec::with_capacity(records.len());

        for (row_index, record) in records.iter().enumerate() {
            let start = report.issues.len();
            let mut row = CleanRow::new();
            let mut dropped = false;

            for column in &schema.columns {
                let (value, issue) = match self.read_cell(column, record) {
                    Cell::Value(value) => (Some(value), None),
                    Cell::Missing => {
                        let issue = (column.null_rule == NullRule::DropRow)
                            .then_some((IssueKind::MissingRequiredField, None));
                        (substitute(column.null_rule), issue)
                    }
                    Cell::Unparseable(kind, raw) => {
                        (substitute(column.null_rule), Some((kind, Some(raw))))
                    }
                };

                if let Some((kind, raw)) = issue {
                    report.issues.push(RowIssue {
                        row_index,
                        column: column.name.clone(),
                        kind,
                        raw,
                        row_dropped: false,
                    });
                }

                match value {
                    Some(value) => row.set(column.name.clone(), value),
                    None => dropped = true,
                }
            }

            for name in record.fields().map(|(name, _)| name) {
                if !schema.columns.iter().any(|column| matches_source(column, name)) {
                    report.unmapped_fields.insert(name.trim().to_string());
                }
            }

            if dropped {
                for issue in &mut report.issues[start..] {
                    issue.row_dropped = true;
                }
            } else {
                rows.push(row);
            }
        }

        report.rows_out = rows.len();
        NormalizedTable { board: schema.board, columns: schema.columns.clone(), rows, report }
    }

    /// Renders a clean row back into a raw record that normalizes to the same row.
    pub fn to_raw_record(&self, schema: &BoardSchema, row: &CleanRow) -> RawRecord {
        let date_pattern = self.options.date_patterns.first();
        schema
            .columns
            .iter()
            .map(|column| {
                let value = match row.get(&column.name) {
                    Some(CellValue::Date(date)) => match date_pattern {
                        Some(pattern) => Value::String(pattern.format(*date)),
                        None => Value::String(date.format("%Y-%m-%d").to_string()),
                    },
                    Some(CellValue::Decimal(amount)) => Value::String(amount.to_string()),
                    Some(CellValue::Text(text)) => Value::String(text.clone()),
                    Some(CellValue::Missing) | None => Value::Null,
                };
                (column.name.clone(), value)
            })
            .collect()
    }

    fn read_cell(&self, column: &ColumnPolicy, record: &RawRecord) -> Cell {
        let value = column
            .sources()
            .filter_map(|source| record.lookup(source).map(|(_, value)| value))
            .find(|value| !self.is_missing(value));

        let Some(value) = value else {
            return Cell::Missing;
        };

        match column.column_type {
            ColumnType::Text => Cell::Value(CellValue::Text(value_text(value))),
            ColumnType::Decimal => {
                let parsed = match value {
                    Value::Number(number) => amount::parse_decimal(&number.to_string()),
                    Value::String(text) => parse_amount(text, &self.options.currency_symbols),
                    _ => None,
                };
                match parsed {
                    Some(amount) => Cell::Value(CellValue::Decimal(amount)),
                    None => Cell::Unparseable(IssueKind::UnparseableAmount, value_text(value)),
                }
            }
            ColumnType::Date => {
                let parsed = match value {
                    Value::String(text) => parse_date(text, &self.options.date_patterns),
                    _ => None,
                };
                match parsed {
                    Some(date) => Cell::Value(CellValue::Date(date)),
                    None => Cell::Unparseable(IssueKind::UnparseableDate, value_text(value)),
                }
            }
        }
    }

    fn is_missing(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(text) => {
                let text = text.trim();
                text.is_empty() || self.options.is_sentinel(text)
            }
            _ => false,
        }
    }
}

fn substitute(rule: NullRule) -> Option<CellValue> {
    match rule {
        NullRule::DropRow => None,
        NullRule::SubstituteZero => Some(CellValue::Decimal(Decimal::ZERO)),
        NullRule::SubstituteEmptyText => Some(CellValue::Text(String::new())),
        NullRule::LeaveMissing => Some(CellValue::Missing),
    }
}

fn matches_source(column: &ColumnPolicy, field: &str) -> bool {
    let field = field.trim();
    column.sources().any(|source| source.trim().eq_ignore_ascii_case(field))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
