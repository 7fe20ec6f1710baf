//! Secret service implementation.
//!
//! The Gemini API key is taken from the environment first (`GEMINI_API_KEY`,
//! then `API_KEY`) and from `secret.json` otherwise.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use parley_core::config::{GeminiConfig, SecretConfig};
use parley_core::secret::SecretService;
use parley_core::{ParleyError, Result};

use crate::paths::ParleyPaths;

/// Environment variables consulted for the API key, in priority order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Reads `secret.json` once and caches it.
#[derive(Clone)]
pub struct SecretServiceImpl {
    secret_path: PathBuf,
    read_env: bool,
    /// Cached secret config loaded from disk.
    secrets: Arc<RwLock<Option<SecretConfig>>>,
}

impl SecretServiceImpl {
    pub fn new(paths: &ParleyPaths) -> Result<Self> {
        let secret_path = paths
            .secret_file()
            .map_err(|e| ParleyError::config(format!("Failed to get secret path: {e}")))?;
        Ok(Self::with_path(secret_path))
    }

    pub fn with_path(secret_path: PathBuf) -> Self {
        Self {
            secret_path,
            read_env: true,
            secrets: Arc::new(RwLock::new(None)),
        }
    }

    /// Ignores environment variables and reads only the file.
    pub fn without_env(mut self) -> Self {
        self.read_env = false;
        self
    }

    fn env_api_key(&self) -> Option<String> {
        if !self.read_env {
            return None;
        }
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|value| !value.trim().is_empty())
    }

    async fn load_file(&self) -> Result<SecretConfig> {
        if let Ok(guard) = self.secrets.read()
            && let Some(cached) = guard.as_ref()
        {
            return Ok(cached.clone());
        }

        let loaded = if tokio::fs::try_exists(&self.secret_path).await? {
            let content = tokio::fs::read_to_string(&self.secret_path).await?;
            serde_json::from_str::<SecretConfig>(&content).map_err(|e| {
                ParleyError::config(format!(
                    "Failed to parse secret file at {}: {}",
                    self.secret_path.display(),
                    e
                ))
            })?
        } else {
            SecretConfig::default()
        };

        if let Ok(mut guard) = self.secrets.write() {
            *guard = Some(loaded.clone());
        }
        Ok(loaded)
    }
}

#[async_trait::async_trait]
impl SecretService for SecretServiceImpl {
    async fn load_secrets(&self) -> Result<SecretConfig> {
        if let Some(api_key) = self.env_api_key() {
            return Ok(SecretConfig {
                gemini: Some(GeminiConfig { api_key }),
            });
        }
        self.load_file().await
    }
}
