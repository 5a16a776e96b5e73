use crate::domain::record::CellValue;
use crate::normalize::NormalizedTable;

pub const EMPTY_TABLE: &str = "No data";

/// Renders the first `limit` rows as a GitHub-flavored markdown table.
pub fn render_markdown(table: &NormalizedTable, limit: usize) -> String {
    if table.is_empty() || limit == 0 {
        return EMPTY_TABLE.to_string();
    }

    let headers: Vec<&str> = table.column_names().collect();
    let mut lines = Vec::with_capacity(limit.min(table.len()) + 2);
    lines.push(format!("| {} |", headers.iter().map(|h| escape(h)).collect::<Vec<_>>().join(" | ")));
    lines.push(format!("|{}|", headers.iter().map(|_| ":---").collect::<Vec<_>>().join("|")));

    for row in table.rows.iter().take(limit) {
        let cells: Vec<String> = headers
            .iter()
            .map(|header| row.get(header).map(render_cell).unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    lines.join("\n")
}

fn render_cell(value: &CellValue) -> String {
    escape(&value.to_string())
}

fn escape(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use crate::domain::board::Board;
    use crate::domain::policy::{BoardSchema, ColumnPolicy, ColumnType, NullRule};
    use crate::domain::record::RawRecord;
    use crate::normalize::{NormalizedTable, Normalizer};

    use super::{render_markdown, EMPTY_TABLE};

    fn schema() -> BoardSchema {
        BoardSchema::new(
            Board::WorkOrders,
            vec![
                ColumnPolicy::new("Item Name", ColumnType::Text, NullRule::DropRow),
                ColumnPolicy::new("Order Value", ColumnType::Decimal, NullRule::SubstituteZero),
                ColumnPolicy::new("Due Date", ColumnType::Date, NullRule::LeaveMissing),
            ],
        )
        .expect("schema")
    }

    #[test]
    fn renders_header_separator_and_limited_rows() {
        let records: Vec<_> = ["WO-1", "WO-2", "WO-3", "WO-4"]
            .into_iter()
            .map(|name| RawRecord::new().with("Item Name", name).with("Order Value", "$10"))
            .collect();
        let table = Normalizer::default().normalize(&schema(), &records);

        let markdown = render_markdown(&table, 3);
        let lines: Vec<_> = markdown.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "| Item Name | Order Value | Due Date |");
        assert_eq!(lines[1], "|:---|:---|:---|");
        assert_eq!(lines[2], "| WO-1 | 10 |  |");
    }

    #[test]
    fn pipes_are_escaped() {
        let records = [RawRecord::new().with("Item Name", "A|B")];
        let table = Normalizer::default().normalize(&schema(), &records);
        assert!(render_markdown(&table, 1).contains("A\\|B"));
    }

    #[test]
    fn empty_tables_render_placeholder() {
        assert_eq!(render_markdown(&NormalizedTable::empty(&schema()), 3), EMPTY_TABLE);
    }
}
