use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An unvalidated record as returned by the data source.
///
/// Field names are kept exactly as received; lookups through [`RawRecord::lookup`]
/// ignore surrounding whitespace and ASCII case so that a renamed or re-spaced
/// column title on the remote board still resolves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(BTreeMap<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Case- and whitespace-insensitive lookup. Returns the stored key with the value.
    pub fn lookup(&self, field: &str) -> Option<(&str, &Value)> {
        if let Some((key, value)) = self.0.get_key_value(field) {
            return Some((key.as_str(), value));
        }

        let wanted = field.trim();
        self.0
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(wanted))
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    Date(NaiveDate),
    Decimal(Decimal),
    Text(String),
    Missing,
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Decimal(amount) => write!(f, "{}", amount.normalize()),
            Self::Text(text) => f.write_str(text),
            Self::Missing => Ok(()),
        }
    }
}

/// A validated row keyed by canonical column name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CleanRow(BTreeMap<String, CellValue>);

impl CleanRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: CellValue) {
        self.0.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    use super::{CellValue, RawRecord};

    #[test]
    fn lookup_ignores_case_and_padding() {
        let record = RawRecord::new().with(" Deal Value ", "$10");

        let (key, value) = record.lookup("deal value").expect("field should resolve");
        assert_eq!(key, " Deal Value ");
        assert_eq!(value, &json!("$10"));
        assert!(record.lookup("Close Date").is_none());
    }

    #[test]
    fn raw_record_deserializes_from_json_object() {
        let record: RawRecord =
            serde_json::from_value(json!({"Item Name": "Acme", "Stage": null})).expect("decode");
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("Stage"), Some(&Value::Null));
    }

    #[test]
    fn cell_display_is_plain() {
        assert_eq!(CellValue::Decimal(Decimal::new(123450, 2)).to_string(), "1234.5");
        assert_eq!(CellValue::Missing.to_string(), "");
        assert_eq!(CellValue::Text("Won".to_string()).to_string(), "Won");
    }
}
