//! Secret management service trait.
//!
//! Defines the interface for loading the ambient service credential.

use crate::config::SecretConfig;
use crate::error::Result;

/// Service for managing secret configuration.
///
/// Implementations must never include secret values in logs or error
/// messages.
#[async_trait::async_trait]
pub trait SecretService: Send + Sync {
    /// Loads the secret configuration.
    async fn load_secrets(&self) -> Result<SecretConfig>;

    /// Resolves the Gemini API key, if one is configured anywhere.
    async fn gemini_api_key(&self) -> Result<Option<String>> {
        Ok(self
            .load_secrets()
            .await?
            .gemini
            .map(|gemini| gemini.api_key)
            .filter(|key| !key.trim().is_empty()))
    }
}
