use std::path::{Path, PathBuf};

use tracing::info;

use crate::app_dirs;

use super::errors::ConfigError;
use super::types::AppConfig;

/// Default filename used to store the settings.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load settings from the app root, returning defaults if the file is missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    let path = config_path()?;
    let mut config = load_from(&path)?;
    if config.dataset_path.is_none()
        && let Some(parent) = path.parent()
    {
        config.dataset_path = Some(parent.join(crate::classifier::dataset::DATASET_FILE_NAME));
    }
    Ok(config)
}

/// Load settings from an explicit path; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded settings from {}", path.display());
    Ok(config.normalized())
}

/// Persist settings to the app root, overwriting any previous contents.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    save_to_path(config, &config_path()?)
}

/// Save settings to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
