//! Tabular dataset loaded for grounded question answering.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Fallback display name when a URL has no usable last segment.
pub const DEFAULT_DATASET_NAME: &str = "file.csv";

/// A type-inferred cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One decoded row: column name to value, in header order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from `(column, value)` pairs, keeping their order.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, CellValue)>,
        K: Into<String>,
    {
        let mut record = Self::new();
        for (column, value) in pairs {
            record.insert(column, value);
        }
        record
    }

    /// Sets `column`; an existing column keeps its position.
    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column names in order.
    pub fn columns(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Output of a CSV ingestion: decoded rows plus the untouched source text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCsv {
    pub records: Vec<Record>,
    pub raw_text: String,
}

/// The single dataset currently grounding the conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDataset {
    /// Display name (file name or last URL segment).
    pub id: String,
    pub records: Vec<Record>,
    pub raw_text: String,
}

impl LoadedDataset {
    pub fn new(id: impl Into<String>, parsed: ParsedCsv) -> Self {
        Self {
            id: id.into(),
            records: parsed.records,
            raw_text: parsed.raw_text,
        }
    }

    /// Column names derived from the first record; empty without records.
    pub fn columns(&self) -> Vec<&str> {
        self.records
            .first()
            .map(|record| record.columns())
            .unwrap_or_default()
    }
}

/// Where a CSV comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvSource {
    File(PathBuf),
    Url(String),
}

impl CsvSource {
    /// Name used for the loaded dataset and progress messages.
    pub fn display_name(&self) -> String {
        match self {
            CsvSource::Url(url) => url
                .rsplit('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .unwrap_or(DEFAULT_DATASET_NAME)
                .to_string(),
            CsvSource::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_DATASET_NAME.to_string()),
        }
    }

    /// "URL: <url>" or "file: <name>".
    pub fn describe(&self) -> String {
        match self {
            CsvSource::Url(url) => format!("URL: {url}"),
            CsvSource::File(_) => format!("file: {}", self.display_name()),
        }
    }
}

/// Decodes a file or remote resource into records plus the raw text.
#[async_trait]
pub trait CsvIngestor: Send + Sync {
    async fn parse(&self, source: &CsvSource) -> Result<ParsedCsv>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_column_order() {
        let record = Record::from_pairs([
            ("b", CellValue::Number(2.0)),
            ("a", CellValue::Number(1.0)),
        ]);
        assert_eq!(record.columns(), vec!["b", "a"]);
        assert_eq!(record.get("a"), Some(&CellValue::Number(1.0)));
        assert_eq!(record.get("z"), None);
    }

    #[test]
    fn test_display_name() {
        let url = CsvSource::Url("https://example.com/data/people.csv".to_string());
        assert_eq!(url.display_name(), "people.csv");
        assert_eq!(url.describe(), "URL: https://example.com/data/people.csv");

        let trailing = CsvSource::Url("https://example.com/".to_string());
        assert_eq!(trailing.display_name(), DEFAULT_DATASET_NAME);

        let file = CsvSource::File(PathBuf::from("/tmp/data.csv"));
        assert_eq!(file.display_name(), "data.csv");
        assert_eq!(file.describe(), "file: data.csv");
    }

    #[test]
    fn test_columns_of_empty_dataset() {
        let dataset = LoadedDataset::new(
            "empty.csv",
            ParsedCsv {
                records: Vec::new(),
                raw_text: String::new(),
            },
        );
        assert!(dataset.columns().is_empty());
    }
}
