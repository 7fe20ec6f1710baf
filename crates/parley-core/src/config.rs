//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};

use crate::model::ModelTier;

/// Default Gemini REST endpoint (model name and method are appended).
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// Default CORS relay used to fetch remote CSV files.
pub const DEFAULT_CORS_RELAY_URL: &str = "https://api.allorigins.win/raw";
/// Ingestion ceiling on raw CSV text, in characters.
pub const DEFAULT_MAX_CSV_CHARS: usize = 1_000_000;

/// Root structure of `config.toml`. Every field is optional.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub default_model: ModelTier,
    pub api_base_url: String,
    pub cors_relay_url: String,
    pub max_csv_chars: usize,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: ModelTier::default(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cors_relay_url: DEFAULT_CORS_RELAY_URL.to_string(),
            max_csv_chars: DEFAULT_MAX_CSV_CHARS,
            log_level: "info".to_string(),
        }
    }
}

/// Root structure of `secret.json`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretConfig {
    #[serde(default)]
    pub gemini: Option<GeminiConfig>,
}

/// Gemini API configuration
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: String,
}
