use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app_dirs::AppDirs;

use super::{ConfigError, Settings};

/// Settings file name inside the app directory.
pub const CONFIG_FILE_NAME: &str = "shimmer.toml";

/// Resolve the settings path inside the app directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dirs = AppDirs::resolve()?;
    dirs.ensure_root()?;
    Ok(dirs.settings_file())
}

/// Load settings from the app directory, returning defaults if the file is missing.
pub fn load_or_default() -> Result<Settings, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        debug!("No settings at {}; using defaults", path.display());
        return Ok(Settings::default());
    }
    load_from_path(&path)
}

/// Load and validate settings from an explicit TOML file.
pub fn load_from_path(path: &Path) -> Result<Settings, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = toml::from_str::<Settings>(&text)
        .map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?
        .normalized();
    settings.validate()?;
    debug!("Loaded settings from {}", path.display());
    Ok(settings)
}
