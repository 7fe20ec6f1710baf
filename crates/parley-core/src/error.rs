//! Error types for the Parley application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix appended to every CSV fetch failure.
const UPLOAD_SUGGESTION: &str =
    "As an alternative, you can download the CSV and upload it directly.";

/// Renders a character ceiling the way users read file sizes: whole
/// millions as MB, anything else as a character count.
fn size_label(limit: &usize) -> String {
    if *limit > 0 && limit % 1_000_000 == 0 {
        format!("{}MB", limit / 1_000_000)
    } else {
        format!("{limit} characters")
    }
}

/// A shared error type for the entire Parley application.
///
/// Variants are grouped by where the failure originated so the chat use case
/// can map each kind to its own user-facing message:
///
/// - input validation (`CsvEmpty`, `CsvTooLarge`, `CsvMalformed`)
/// - transport (`CsvFetch`, `Network`)
/// - model service (`MissingCredential`, `ModelService`, `StreamInterrupted`)
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParleyError {
    /// The CSV decoded to zero records.
    #[error("CSV file is empty or could not be parsed.")]
    CsvEmpty,

    /// The raw CSV text exceeds the ingestion ceiling.
    #[error("CSV file is too large (over {}). Please use a smaller file.", size_label(.limit))]
    CsvTooLarge { length: usize, limit: usize },

    /// Fatal structural problem while decoding the CSV.
    #[error("CSV parsing failed: {0}. The file may be malformed or not a valid CSV.")]
    CsvMalformed(String),

    /// The CORS relay answered with a non-success status.
    #[error("{message} {}", UPLOAD_SUGGESTION)]
    CsvFetch { status: u16, message: String },

    /// The remote resource could not be reached at all.
    #[error("Network error: {0}")]
    Network(String),

    /// No API key could be resolved when building the model client.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The model service rejected or failed a generation request.
    #[error("{message}")]
    ModelService { status: Option<u16>, message: String },

    /// The fragment stream broke after it was established.
    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    /// A request is already in flight.
    #[error("A request is already in progress")]
    Busy,

    /// An operation required the in-flight assistant message but none exists.
    #[error("No pending message")]
    NoPendingMessage,

    /// Message lookup by id failed.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Builds a fetch error whose message is tailored to the HTTP status.
    pub fn csv_fetch(status: u16) -> Self {
        let message = match status {
            403 => "The request was forbidden. This can happen if the proxy or the target server has security restrictions.".to_string(),
            404 => "The file was not found at the provided URL. Please check the link.".to_string(),
            429 => "Too many requests. The proxy service may be rate-limiting. Please try again later.".to_string(),
            other => format!("Failed to fetch from URL (Status: {other})."),
        };
        Self::CsvFetch { status, message }
    }

    /// Network failure while fetching a CSV through the relay.
    pub fn csv_network() -> Self {
        Self::Network(
            "Could not fetch the CSV from the URL. Please check your internet connection and the URL. If the issue persists, the remote server may be blocking requests."
                .to_string(),
        )
    }

    /// Summarises decode errors: distinct messages, at most three spelled out.
    pub fn csv_malformed<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for message in messages {
            let message = message.into();
            if !unique.contains(&message) {
                unique.push(message);
            }
        }

        let summary = if unique.len() > 3 {
            format!(
                "{}... and {} more similar errors.",
                unique[..3].join("; "),
                unique.len() - 3
            )
        } else {
            unique.join("; ")
        };
        Self::CsvMalformed(summary)
    }

    /// Creates a ModelService error
    pub fn model_service(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ModelService {
            status,
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Classification
    // ============================================================================

    /// Empty, oversized or malformed CSV input.
    pub fn is_input_validation(&self) -> bool {
        matches!(
            self,
            Self::CsvEmpty | Self::CsvTooLarge { .. } | Self::CsvMalformed(_)
        )
    }

    /// Failures reaching a remote resource.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::CsvFetch { .. } | Self::Network(_))
    }

    /// Failures attributable to the hosted model.
    pub fn is_model_service(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential(_) | Self::ModelService { .. } | Self::StreamInterrupted(_)
        )
    }

    /// Check if this is a Busy rejection
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }

    /// The text shown to the user for this error.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for ParleyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ParleyError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ParleyError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, ParleyError>`.
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_messages_by_status() {
        let forbidden = ParleyError::csv_fetch(403).user_message();
        assert!(forbidden.starts_with("The request was forbidden."));
        assert!(forbidden.ends_with(UPLOAD_SUGGESTION));

        let missing = ParleyError::csv_fetch(404).user_message();
        assert!(missing.contains("was not found at the provided URL"));

        let limited = ParleyError::csv_fetch(429).user_message();
        assert!(limited.contains("rate-limiting"));

        let generic = ParleyError::csv_fetch(502).user_message();
        assert!(generic.starts_with("Failed to fetch from URL (Status: 502)."));
        assert!(generic.ends_with(UPLOAD_SUGGESTION));
    }

    #[test]
    fn test_malformed_summary_truncates_after_three() {
        let err = ParleyError::csv_malformed(["a", "b", "a", "c", "d", "e"]);
        assert_eq!(
            err,
            ParleyError::CsvMalformed("a; b; c... and 2 more similar errors.".to_string())
        );
    }

    #[test]
    fn test_malformed_summary_short_list() {
        let err = ParleyError::csv_malformed(["Quoted field unterminated"]);
        assert_eq!(
            err.user_message(),
            "CSV parsing failed: Quoted field unterminated. The file may be malformed or not a valid CSV."
        );
    }

    #[test]
    fn test_too_large_message_follows_limit() {
        let default = ParleyError::CsvTooLarge {
            length: 1_000_001,
            limit: 1_000_000,
        };
        assert_eq!(
            default.user_message(),
            "CSV file is too large (over 1MB). Please use a smaller file."
        );

        let custom = ParleyError::CsvTooLarge {
            length: 65,
            limit: 64,
        };
        assert_eq!(
            custom.user_message(),
            "CSV file is too large (over 64 characters). Please use a smaller file."
        );
    }

    #[test]
    fn test_classification() {
        assert!(ParleyError::CsvEmpty.is_input_validation());
        assert!(ParleyError::csv_network().is_transport());
        assert!(ParleyError::MissingCredential("x".into()).is_model_service());
        assert!(!ParleyError::Busy.is_model_service());
        assert!(ParleyError::Busy.is_busy());
    }
}
