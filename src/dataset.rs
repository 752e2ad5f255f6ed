//! Dataset Model - Tabular Input Rows
//!
//! A dataset is loaded once per batch and never mutated afterwards.
//! Empty cells are treated as absent values, not empty strings.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Fatal dataset failures. Any of these aborts the batch before row processing.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Dataset is empty: no header row found")]
    Empty,

    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed JSON dataset: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON dataset must be an array of objects (offending record at index {0})")]
    NotARecord(usize),
}

/// One dataset row: column name to cell value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Row {
    values: BTreeMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `column`, or `None` when the cell is absent or empty.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Value for `column`, falling back to `default` when absent.
    pub fn get_or<'a>(&'a self, column: &str, default: &'a str) -> &'a str {
        self.get(column).unwrap_or(default)
    }

    /// Set a cell. Empty values are stored as absent.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&column);
        } else {
            self.values.insert(column, value);
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered rows sharing one fixed column set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Load a dataset from disk. `.json` files are read as an array of
    /// records, anything else as CSV with a header row.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let is_json = path
            .extension()
            .map_or(false, |e| e.eq_ignore_ascii_case("json"));
        if is_json {
            let content = fs::read_to_string(path)?;
            Self::from_json_str(&content)
        } else {
            Self::from_csv_path(path)
        }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, DatasetError> {
        let file = fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Parse CSV with a header row. Ragged rows and invalid UTF-8 are errors.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(DatasetError::Empty);
        }
        let columns: Vec<String> = headers.iter().map(|h| h.to_string()).collect();

        let mut rows = vec![];
        for record in reader.records() {
            let record = record?;
            let mut row = Row::new();
            for (column, value) in columns.iter().zip(record.iter()) {
                row.insert(column.clone(), value);
            }
            rows.push(row);
        }

        log::debug!("loaded CSV dataset: {} columns, {} rows", columns.len(), rows.len());
        Ok(Self { columns, rows })
    }

    /// Parse a JSON array of flat objects. The column set is the union of
    /// all record keys.
    pub fn from_json_str(content: &str) -> Result<Self, DatasetError> {
        if content.trim().is_empty() {
            return Err(DatasetError::Empty);
        }
        let records: Vec<Value> = serde_json::from_str(content)?;

        let mut columns: Vec<String> = vec![];
        let mut rows = vec![];
        for (index, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or(DatasetError::NotARecord(index))?;
            let mut row = Row::new();
            for (key, value) in object {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
                if let Some(text) = cell_text(value) {
                    row.insert(key.clone(), text);
                }
            }
            rows.push(row);
        }

        log::debug!("loaded JSON dataset: {} columns, {} rows", columns.len(), rows.len());
        Ok(Self { columns, rows })
    }
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_header_defines_columns() {
        let csv = "First Name,Email\nAda,ada@example.com\nGrace,\n";
        let dataset = Dataset::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.columns(), &["First Name".to_string(), "Email".to_string()]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows()[0].get("First Name"), Some("Ada"));
        // Empty cell is absent
        assert_eq!(dataset.rows()[1].get("Email"), None);
        assert_eq!(dataset.rows()[1].get_or("Email", "n/a"), "n/a");
    }

    #[test]
    fn test_header_only_is_valid() {
        let dataset = Dataset::from_csv_reader("First Name\n".as_bytes()).unwrap();
        assert!(dataset.is_empty());
        assert!(dataset.has_column("First Name"));
    }

    #[test]
    fn test_empty_input_is_error() {
        let err = Dataset::from_csv_reader("".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));
    }

    #[test]
    fn test_ragged_rows_are_error() {
        let err = Dataset::from_csv_reader("a,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::Csv(_)));
    }

    #[test]
    fn test_invalid_utf8_is_error() {
        let bytes: &[u8] = b"name\n\xff\xfe\n";
        let err = Dataset::from_csv_reader(bytes).unwrap_err();
        assert!(matches!(err, DatasetError::Csv(_)));
    }

    #[test]
    fn test_json_records() {
        let json = r#"[{"First Name": "Ada", "Orders": 3}, {"Email": null, "First Name": "Alan"}]"#;
        let dataset = Dataset::from_json_str(json).unwrap();
        assert!(dataset.has_column("Orders"));
        assert!(dataset.has_column("Email"));
        assert_eq!(dataset.rows()[0].get("Orders"), Some("3"));
        assert_eq!(dataset.rows()[1].get("Email"), None);
    }

    #[test]
    fn test_json_non_object_rejected() {
        let err = Dataset::from_json_str(r#"[{"a": 1}, 5]"#).unwrap_err();
        assert!(matches!(err, DatasetError::NotARecord(1)));
    }
}
