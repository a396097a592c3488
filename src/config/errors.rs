use std::path::PathBuf;

use thiserror::Error;

/// Errors that may occur while loading or validating batch settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a settings file.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Failed to parse TOML settings.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        /// TOML file path.
        path: PathBuf,
        /// TOML parse error.
        source: toml::de::Error,
    },
    /// A value is outside its documented range.
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending config key.
        field: &'static str,
        /// Human-readable constraint violation.
        reason: String,
    },
    /// No usable config directory found.
    #[error("No suitable config directory found: {0}")]
    NoConfigDir(#[from] crate::app_dirs::AppDirError),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: String) -> Self {
        Self::Invalid { field, reason }
    }
}
