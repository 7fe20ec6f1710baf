//! Loading of `config.toml`.

use std::path::PathBuf;

use parley_core::config::AppConfig;
use parley_core::{ParleyError, Result};

use crate::paths::ParleyPaths;

/// Reads the application configuration from `config.toml`.
///
/// A missing file yields the defaults; a file that does not parse is an error.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config_path: PathBuf,
}

impl ConfigService {
    pub fn new(paths: &ParleyPaths) -> Result<Self> {
        let config_path = paths
            .config_file()
            .map_err(|e| ParleyError::config(format!("Failed to get config path: {e}")))?;
        Ok(Self::with_path(config_path))
    }

    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub async fn load_config(&self) -> Result<AppConfig> {
        if !tokio::fs::try_exists(&self.config_path).await? {
            tracing::debug!(
                "[ConfigService] No config at {}, using defaults",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let content = tokio::fs::read_to_string(&self.config_path).await?;
        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            ParleyError::config(format!(
                "Failed to parse configuration file at {}: {}",
                self.config_path.display(),
                e
            ))
        })?;
        Ok(config)
    }
}
