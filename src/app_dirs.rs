//! On-disk layout: one `.shimmer-pca` folder holding `shimmer.toml` and `logs/`.
//!
//! The folder lives under the OS config directory unless `SHIMMER_PCA_CONFIG_HOME`
//! names another base (tests, portable installs).

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

use crate::config::CONFIG_FILE_NAME;

/// Name of the application folder under the config base.
pub const APP_DIR_NAME: &str = ".shimmer-pca";
/// Environment variable that replaces the OS config base.
pub const CONFIG_HOME_ENV: &str = "SHIMMER_PCA_CONFIG_HOME";
const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config base directory: set {CONFIG_HOME_ENV} or a user home")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Resolved application folder. Paths are computed eagerly, directories created on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Use `SHIMMER_PCA_CONFIG_HOME` when set and non-empty, else the OS config dir.
    pub fn resolve() -> Result<Self, AppDirError> {
        let base = std::env::var_os(CONFIG_HOME_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
            .ok_or(AppDirError::NoBaseDir)?;
        Ok(Self::under(&base))
    }

    pub fn under(base: &Path) -> Self {
        Self {
            root: base.join(APP_DIR_NAME),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `shimmer.toml`; the file itself may not exist.
    pub fn settings_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    pub fn ensure_root(&self) -> Result<&Path, AppDirError> {
        create_dir(&self.root)?;
        Ok(&self.root)
    }

    pub fn ensure_logs_dir(&self) -> Result<PathBuf, AppDirError> {
        let logs = self.root.join(LOGS_DIR_NAME);
        create_dir(&logs)?;
        Ok(logs)
    }
}

fn create_dir(path: &Path) -> Result<(), AppDirError> {
    std::fs::create_dir_all(path).map_err(|source| AppDirError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}
