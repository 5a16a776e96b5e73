//! Prompt rendering.
//!
//! Every board in the session is rendered as a short markdown sample plus a
//! list of facts computed from the cleaned table, so the model quotes totals
//! instead of computing them.

use boardsight_core::metrics::{DateRange, DecimalStats, TableMetrics, TextBreakdown};
use boardsight_core::table::{render_markdown, EMPTY_TABLE};
use boardsight_core::{Board, NormalizedTable, SessionContext};
use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

const QUESTION_TEMPLATE: &str = "question.md";
const SUMMARY_TEMPLATE: &str = "executive_summary.md";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("failed to load prompt template `{template}`: {source}")]
    Template {
        template: &'static str,
        #[source]
        source: tera::Error,
    },
    #[error("failed to render prompt `{template}`: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: tera::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ColumnContext {
    pub name: String,
    pub kind: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BoardContext {
    pub name: &'static str,
    pub variable: &'static str,
    pub rows: usize,
    pub columns: Vec<ColumnContext>,
    pub sample: String,
    pub facts: Vec<String>,
}

impl BoardContext {
    pub fn from_table(table: &NormalizedTable, sample_rows: usize) -> Self {
        Self {
            name: table.board.display_name(),
            variable: frame_variable(table.board),
            rows: table.len(),
            columns: table
                .columns
                .iter()
                .map(|column| ColumnContext {
                    name: column.name.clone(),
                    kind: column.column_type.as_str(),
                })
                .collect(),
            sample: render_markdown(table, sample_rows),
            facts: facts(table),
        }
    }

    fn not_loaded(board: Board) -> Self {
        Self {
            name: board.display_name(),
            variable: frame_variable(board),
            rows: 0,
            columns: Vec::new(),
            sample: EMPTY_TABLE.to_string(),
            facts: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct PromptData<'a> {
    boards: Vec<BoardContext>,
    question: Option<&'a str>,
}

pub struct PromptRenderer {
    tera: Tera,
    sample_rows: usize,
}

impl PromptRenderer {
    pub fn new(sample_rows: usize) -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        for (template, source) in [
            (
                QUESTION_TEMPLATE,
                include_str!("../../../templates/prompts/question.md.tera"),
            ),
            (
                SUMMARY_TEMPLATE,
                include_str!("../../../templates/prompts/executive_summary.md.tera"),
            ),
        ] {
            tera.add_raw_template(template, source)
                .map_err(|source| PromptError::Template { template, source })?;
        }

        Ok(Self { tera, sample_rows })
    }

    pub fn sample_rows(&self) -> usize {
        self.sample_rows
    }

    pub fn question(&self, session: &SessionContext, question: &str) -> Result<String, PromptError> {
        self.render(QUESTION_TEMPLATE, session, Some(question))
    }

    pub fn executive_summary(&self, session: &SessionContext) -> Result<String, PromptError> {
        self.render(SUMMARY_TEMPLATE, session, None)
    }

    pub fn boards(&self, session: &SessionContext) -> Vec<BoardContext> {
        Board::ALL
            .into_iter()
            .map(|board| match session.table(board) {
                Some(table) => BoardContext::from_table(table, self.sample_rows),
                None => BoardContext::not_loaded(board),
            })
            .collect()
    }

    fn render(
        &self,
        template: &'static str,
        session: &SessionContext,
        question: Option<&str>,
    ) -> Result<String, PromptError> {
        let data = PromptData { boards: self.boards(session), question: question.map(str::trim) };
        let context = Context::from_serialize(&data)
            .map_err(|source| PromptError::Render { template, source })?;
        self.tera.render(template, &context).map_err(|source| PromptError::Render { template, source })
    }
}

fn frame_variable(board: Board) -> &'static str {
    match board {
        Board::Deals => "df_deals",
        Board::WorkOrders => "df_orders",
    }
}

pub fn facts(table: &NormalizedTable) -> Vec<String> {
    if table.is_empty() {
        return Vec::new();
    }

    let metrics = TableMetrics::compute(table);
    let mut facts = vec![format!("{} rows", metrics.rows)];
    if table.report.rows_dropped() > 0 {
        facts.push(format!(
            "{} source rows were dropped during cleaning",
            table.report.rows_dropped()
        ));
    }

    facts.extend(metrics.decimals.iter().filter(|stats| stats.count > 0).map(decimal_fact));
    facts.extend(metrics.texts.iter().filter(|breakdown| !breakdown.top.is_empty()).map(text_fact));
    facts.extend(metrics.dates.iter().filter_map(date_fact));
    facts
}

fn decimal_fact(stats: &DecimalStats) -> String {
    let mut fact = match stats.sum {
        Some(sum) => format!("{}: total {} across {} values", stats.column, amount(sum), stats.count),
        None => format!("{}: {} values, total too large to compute", stats.column, stats.count),
    };
    if let Some(average) = stats.average {
        fact.push_str(&format!(", average {}", amount(average)));
    }
    if let (Some(min), Some(max)) = (stats.min, stats.max) {
        fact.push_str(&format!(", min {}, max {}", amount(min), amount(max)));
    }
    fact
}

fn text_fact(breakdown: &TextBreakdown) -> String {
    let top = breakdown
        .top
        .iter()
        .map(|entry| format!("{} ({})", entry.value, entry.count))
        .collect::<Vec<_>>()
        .join(", ");
    let mut fact = format!("{}: {} distinct; top {}", breakdown.column, breakdown.distinct, top);
    if breakdown.blank > 0 {
        fact.push_str(&format!("; {} blank", breakdown.blank));
    }
    fact
}

fn date_fact(range: &DateRange) -> Option<String> {
    let (earliest, latest) = (range.earliest?, range.latest?);
    let mut fact = format!("{}: from {} to {}", range.column, earliest, latest);
    if range.missing > 0 {
        fact.push_str(&format!("; {} missing", range.missing));
    }
    Some(fact)
}

fn amount(value: Decimal) -> String {
    value.normalize().to_string()
}
