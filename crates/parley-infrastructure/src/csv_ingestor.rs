//! CSV ingestion from local files or remote URLs.
//!
//! Remote files are fetched through a CORS relay (`<relay>?url=<target>`).
//! The raw text is checked against a character ceiling before decoding, and
//! decoding treats the first row as the header, skips blank lines, tolerates
//! ragged rows and infers numbers, booleans and nulls from cell text.

use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parley_core::config::{DEFAULT_CORS_RELAY_URL, DEFAULT_MAX_CSV_CHARS};
use parley_core::{CellValue, CsvIngestor, CsvSource, ParleyError, ParsedCsv, Record, Result};
use regex::Regex;
use reqwest::{Client, Url};

const UNTERMINATED_QUOTE: &str = "Quoted field unterminated";
const TRAILING_QUOTE: &str = "Trailing quote on quoted field is malformed";

/// Largest integer magnitude an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*-?(\d+\.?|\.\d+|\d+\.\d+)([eE][-+]?\d+)?\s*$")
        .expect("numeric pattern is valid")
});

/// [`CsvIngestor`] backed by the filesystem and an HTTP CORS relay.
#[derive(Clone)]
pub struct CsvIngestorImpl {
    client: Client,
    relay_url: String,
    max_chars: usize,
}

impl Default for CsvIngestorImpl {
    fn default() -> Self {
        Self::new(DEFAULT_CORS_RELAY_URL, DEFAULT_MAX_CSV_CHARS)
    }
}

impl CsvIngestorImpl {
    pub fn new(relay_url: impl Into<String>, max_chars: usize) -> Self {
        Self {
            client: Client::new(),
            relay_url: relay_url.into(),
            max_chars,
        }
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path).await.map_err(|e| {
            ParleyError::io(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    async fn fetch(&self, target: &str) -> Result<String> {
        let url = Url::parse_with_params(&self.relay_url, &[("url", target)]).map_err(|e| {
            ParleyError::config(format!("Invalid CORS relay URL '{}': {}", self.relay_url, e))
        })?;

        let response = self.client.get(url).send().await.map_err(|err| {
            tracing::error!("[CsvIngestor] Relay request failed: {}", err);
            ParleyError::csv_network()
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                "[CsvIngestor] Proxy fetch error: {}",
                body
            );
            return Err(ParleyError::csv_fetch(status.as_u16()));
        }

        response.text().await.map_err(|err| {
            tracing::error!("[CsvIngestor] Failed to read relay body: {}", err);
            ParleyError::csv_network()
        })
    }
}

#[async_trait]
impl CsvIngestor for CsvIngestorImpl {
    async fn parse(&self, source: &CsvSource) -> Result<ParsedCsv> {
        let raw_text = match source {
            CsvSource::File(path) => self.read_file(path).await?,
            CsvSource::Url(url) => self.fetch(url).await?,
        };
        parse_csv_text(raw_text, self.max_chars)
    }
}

/// Rejects text longer than `max_chars` characters.
pub fn check_size(raw_text: &str, max_chars: usize) -> Result<()> {
    let length = raw_text.chars().count();
    if length > max_chars {
        return Err(ParleyError::CsvTooLarge {
            length,
            limit: max_chars,
        });
    }
    Ok(())
}

/// Decodes `raw_text` into records, keeping the text alongside them.
///
/// Malformed quoting is fatal. Ragged rows are logged and kept: missing
/// trailing cells are left out of the record and extra cells are dropped.
pub fn parse_csv_text(raw_text: String, max_chars: usize) -> Result<ParsedCsv> {
    check_size(&raw_text, max_chars)?;

    let quote_errors = find_quote_errors(&raw_text);
    if !quote_errors.is_empty() {
        return Err(ParleyError::csv_malformed(quote_errors));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(raw_text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParleyError::csv_malformed([e.to_string()]))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut records = Vec::new();
    let mut warnings = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warnings.push(e.to_string());
                continue;
            }
        };
        if row.len() == 1 && row.get(0).is_some_and(str::is_empty) {
            continue;
        }
        if row.len() != headers.len() {
            let kind = if row.len() < headers.len() {
                "Too few fields"
            } else {
                "Too many fields"
            };
            warnings.push(format!(
                "{kind}: expected {} fields but parsed {} (row {})",
                headers.len(),
                row.len(),
                index + 1
            ));
        }

        records.push(Record::from_pairs(
            headers
                .iter()
                .zip(row.iter())
                .map(|(column, cell)| (column.as_str(), infer_cell(cell))),
        ));
    }

    if records.is_empty() {
        if warnings.is_empty() {
            return Err(ParleyError::CsvEmpty);
        }
        return Err(ParleyError::csv_malformed(warnings));
    }
    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "[CsvIngestor] CSV parsing generated some warnings: {:?}",
            warnings
        );
    }

    Ok(ParsedCsv { records, raw_text })
}

/// Infers a typed value from cell text.
pub fn infer_cell(cell: &str) -> CellValue {
    if cell.is_empty() {
        return CellValue::Null;
    }
    match cell {
        "true" | "TRUE" => return CellValue::Bool(true),
        "false" | "FALSE" => return CellValue::Bool(false),
        _ => {}
    }
    if NUMERIC.is_match(cell)
        && let Ok(number) = cell.trim().parse::<f64>()
        && number.abs() <= MAX_SAFE_INTEGER
    {
        return CellValue::Number(number);
    }
    CellValue::Text(cell.to_string())
}

/// Scans for quoting errors: an unterminated quoted field, or text after a
/// closing quote. Spaces and tabs between a closing quote and the delimiter
/// are allowed.
pub fn find_quote_errors(raw_text: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let mut chars = raw_text.chars().peekable();
    let mut field_start = true;
    let mut in_quotes = false;
    let mut after_close = false;
    let mut row = 1usize;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    in_quotes = false;
                    after_close = true;
                }
            }
            continue;
        }

        if after_close {
            if matches!(c, ' ' | '\t') {
                continue;
            }
            after_close = false;
            if !matches!(c, ',' | '\n' | '\r') {
                tracing::debug!(row, "[CsvIngestor] {}", TRAILING_QUOTE);
                errors.push(TRAILING_QUOTE.to_string());
                field_start = false;
                continue;
            }
        }

        match c {
            '"' if field_start => {
                in_quotes = true;
                field_start = false;
            }
            ',' | '\r' => field_start = true,
            '\n' => {
                field_start = true;
                row += 1;
            }
            _ => field_start = false,
        }
    }

    if in_quotes {
        tracing::debug!(row, "[CsvIngestor] {}", UNTERMINATED_QUOTE);
        errors.push(UNTERMINATED_QUOTE.to_string());
    }
    errors
}
