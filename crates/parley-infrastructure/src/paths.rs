//! Unified path management for parley configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/parley/            # Config directory
//! ├── config.toml              # Application configuration
//! ├── secret.json              # API keys
//! └── logs/                    # Application logs
//!     └── parley.log.YYYY-MM-DD
//! ```

use std::path::{Path, PathBuf};

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolves every file parley reads or writes.
///
/// A base path overrides the home-relative config directory, which keeps
/// tests inside a temporary directory.
#[derive(Debug, Clone, Default)]
pub struct ParleyPaths {
    base: Option<PathBuf>,
}

impl ParleyPaths {
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
        }
    }

    /// Returns the parley configuration directory (e.g. `~/.config/parley/`).
    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        if let Some(base) = &self.base {
            return Ok(base.clone());
        }
        let home = dirs::home_dir().ok_or(PathError::HomeDirNotFound)?;
        Ok(home.join(".config").join("parley"))
    }

    /// Path to config.toml
    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Path to secret.json
    ///
    /// Keep this file readable only by its owner (600).
    pub fn secret_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("secret.json"))
    }

    /// Directory holding rolling log files.
    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_override() {
        let paths = ParleyPaths::new(Some(Path::new("/tmp/parley-test")));
        assert_eq!(
            paths.config_file().unwrap(),
            PathBuf::from("/tmp/parley-test/config.toml")
        );
        assert_eq!(
            paths.secret_file().unwrap(),
            PathBuf::from("/tmp/parley-test/secret.json")
        );
        assert_eq!(paths.logs_dir().unwrap(), PathBuf::from("/tmp/parley-test/logs"));
    }
}
