//! Application directory helpers anchored to a single `.touchalert` folder.
//!
//! Config, logs and the saved example dataset all live under one root,
//! defaulting to the OS config directory and allowing a
//! `TOUCHALERT_CONFIG_HOME` override for tests or portable setups.

use std::{
    path::PathBuf,
    sync::{LazyLock, Mutex},
};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory that lives under the OS config root.
pub const APP_DIR_NAME: &str = ".touchalert";
/// Environment variable that replaces the OS config root.
pub const CONFIG_HOME_ENV: &str = "TOUCHALERT_CONFIG_HOME";

static CONFIG_BASE_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

/// Errors that can occur while resolving or preparing application directories.
#[derive(Debug, Error)]
pub enum AppDirError {
    /// No suitable base config directory could be resolved.
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    /// Failed to create the application directory.
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Return the root `.touchalert` directory, creating it if needed.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = config_base_dir().ok_or(AppDirError::NoBaseDir)?;
    let path = base.join(APP_DIR_NAME);
    create_dir(path)
}

/// Return the logs directory inside the app root, creating it if needed.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    create_dir(app_root_dir()?.join("logs"))
}

fn create_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn config_base_dir() -> Option<PathBuf> {
    if let Some(path) = CONFIG_BASE_OVERRIDE
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
    {
        return Some(path);
    }
    if let Ok(path) = std::env::var(CONFIG_HOME_ENV) {
        return Some(PathBuf::from(path));
    }
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Scoped override of the config base directory, restored on drop.
#[cfg(test)]
pub(crate) struct ConfigBaseGuard {
    _lock: std::sync::MutexGuard<'static, ()>,
}

#[cfg(test)]
static OVERRIDE_LOCK: Mutex<()> = Mutex::new(());

#[cfg(test)]
impl ConfigBaseGuard {
    pub(crate) fn set(path: PathBuf) -> Self {
        let lock = OVERRIDE_LOCK
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let mut guard = CONFIG_BASE_OVERRIDE
            .lock()
            .expect("config base override mutex poisoned");
        *guard = Some(path);
        Self { _lock: lock }
    }
}

#[cfg(test)]
impl Drop for ConfigBaseGuard {
    fn drop(&mut self) {
        if let Ok(mut guard) = CONFIG_BASE_OVERRIDE.lock() {
            *guard = None;
        }
    }
}
