//! Deterministic aggregates over a normalized table.
//!
//! These are computed locally and handed to the model as facts, so answers
//! never depend on the model doing arithmetic.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::board::Board;
use crate::domain::policy::ColumnType;
use crate::domain::record::CellValue;
use crate::normalize::NormalizedTable;

const TOP_VALUES: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecimalStats {
    pub column: String,
    pub count: usize,
    /// `None` when the total does not fit in a `Decimal`.
    pub sum: Option<Decimal>,
    pub average: Option<Decimal>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextBreakdown {
    pub column: String,
    pub distinct: usize,
    pub blank: usize,
    pub top: Vec<ValueCount>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub column: String,
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
    pub missing: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableMetrics {
    pub board: Board,
    pub rows: usize,
    pub decimals: Vec<DecimalStats>,
    pub texts: Vec<TextBreakdown>,
    pub dates: Vec<DateRange>,
}

impl TableMetrics {
    pub fn compute(table: &NormalizedTable) -> Self {
        let mut decimals = Vec::new();
        let mut texts = Vec::new();
        let mut dates = Vec::new();

        for column in &table.columns {
            let values = table.values(&column.name);
            match column.column_type {
                ColumnType::Decimal => decimals.push(decimal_stats(&column.name, values)),
                ColumnType::Text => texts.push(text_breakdown(&column.name, values)),
                ColumnType::Date => dates.push(date_range(&column.name, values)),
            }
        }

        Self { board: table.board, rows: table.len(), decimals, texts, dates }
    }

    pub fn decimal(&self, column: &str) -> Option<&DecimalStats> {
        self.decimals.iter().find(|stats| stats.column == column)
    }

    pub fn text(&self, column: &str) -> Option<&TextBreakdown> {
        self.texts.iter().find(|breakdown| breakdown.column == column)
    }

    pub fn date(&self, column: &str) -> Option<&DateRange> {
        self.dates.iter().find(|range| range.column == column)
    }
}

fn decimal_stats<'a>(column: &str, values: impl Iterator<Item = &'a CellValue>) -> DecimalStats {
    let amounts: Vec<Decimal> = values.filter_map(CellValue::as_decimal).collect();
    let sum = amounts.iter().try_fold(Decimal::ZERO, |total, amount| total.checked_add(*amount));
    let average = sum
        .filter(|_| !amounts.is_empty())
        .and_then(|sum| sum.checked_div(Decimal::from(amounts.len())))
        .map(|average| average.round_dp(2));

    DecimalStats {
        column: column.to_string(),
        count: amounts.len(),
        sum,
        average,
        min: amounts.iter().copied().min(),
        max: amounts.iter().copied().max(),
    }
}

fn text_breakdown<'a>(column: &str, values: impl Iterator<Item = &'a CellValue>) -> TextBreakdown {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut blank = 0;

    for value in values {
        match value.as_text() {
            Some(text) if !text.is_empty() => *counts.entry(text).or_default() += 1,
            _ => blank += 1,
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.iter().map(|(text, count)| (*text, *count)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    TextBreakdown {
        column: column.to_string(),
        distinct: counts.len(),
        blank,
        top: ranked
            .into_iter()
            .take(TOP_VALUES)
            .map(|(value, count)| ValueCount { value: value.to_string(), count })
            .collect(),
    }
}

fn date_range<'a>(column: &str, values: impl Iterator<Item = &'a CellValue>) -> DateRange {
    let mut missing = 0;
    let mut present = Vec::new();
    for value in values {
        match value.as_date() {
            Some(date) => present.push(date),
            None => missing += 1,
        }
    }

    DateRange {
        column: column.to_string(),
        earliest: present.iter().min().copied(),
        latest: present.iter().max().copied(),
        missing,
    }
}
