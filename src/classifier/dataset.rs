//! JSON snapshots of trained examples.
//!
//! Snapshots let a session pick up where the previous one left off instead of
//! retraining every launch.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::{ClassifyError, KnnClassifier, Label};

/// Default dataset filename inside the app root.
pub const DATASET_FILE_NAME: &str = "dataset.json";
/// Current on-disk layout.
pub const DATASET_VERSION: u32 = 1;

/// Every stored example, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub version: u32,
    pub dim: usize,
    pub examples: Vec<ExampleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub label: Label,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write dataset {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid dataset at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize dataset: {0}")]
    Serialize(serde_json::Error),
    #[error("Dataset {path} has unsupported version {found}")]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error("Dataset {path} is inconsistent: {source}")]
    Invalid {
        path: PathBuf,
        source: ClassifyError,
    },
}

/// Write `snapshot` to `path`, replacing the previous file only once the new
/// one is fully written.
pub fn save(path: &Path, snapshot: &DatasetSnapshot) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| DatasetError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_vec(snapshot).map_err(DatasetError::Serialize)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(|source| DatasetError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| DatasetError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Saved {} examples to {}",
        snapshot.examples.len(),
        path.display()
    );
    Ok(())
}

/// Read a snapshot from `path`, or `None` when no file exists yet.
pub fn load(path: &Path) -> Result<Option<DatasetSnapshot>, DatasetError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: DatasetSnapshot =
        serde_json::from_slice(&bytes).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if snapshot.version != DATASET_VERSION {
        return Err(DatasetError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: snapshot.version,
        });
    }
    Ok(Some(snapshot))
}

/// Load a classifier from `path`, starting empty when the file is missing.
pub fn load_classifier(path: &Path, k: usize) -> Result<KnnClassifier, DatasetError> {
    let Some(snapshot) = load(path)? else {
        return Ok(KnnClassifier::new(k));
    };
    let count = snapshot.examples.len();
    let classifier =
        KnnClassifier::from_snapshot(k, snapshot).map_err(|source| DatasetError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Restored {count} examples from {}", path.display());
    Ok(classifier)
}
