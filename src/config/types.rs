use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Full settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where trained examples are saved; defaults to `dataset.json` in the app root.
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,
    #[serde(default)]
    pub labels: LabelSettings,
    #[serde(default)]
    pub training: TrainingSettings,
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub alert: AlertSettings,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Clamp values into their supported ranges.
    pub fn normalized(mut self) -> Self {
        self.labels = self.labels.normalized();
        self.training.sample_count = self.training.sample_count.max(1);
        self.detection.confidence_threshold = clamp_unit(
            self.detection.confidence_threshold,
            default_confidence_threshold(),
        );
        self.detection.max_consecutive_failures = self.detection.max_consecutive_failures.max(1);
        self.classifier.k = self.classifier.k.clamp(1, MAX_CLASSIFIER_K);
        self.embedding.thumbnail_side = self
            .embedding
            .thumbnail_side
            .clamp(MIN_THUMBNAIL_SIDE, MAX_THUMBNAIL_SIDE);
        self.alert.volume = clamp_unit(self.alert.volume, default_volume());
        if !self.alert.tone_hz.is_finite() || self.alert.tone_hz <= 0.0 {
            self.alert.tone_hz = default_tone_hz();
        }
        self.logging.max_files = self.logging.max_files.max(1);
        self
    }
}

/// The fixed label set and which label raises the alert.
///
/// Config keys: `names`, `positive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSettings {
    #[serde(default = "default_label_names")]
    pub names: Vec<String>,
    #[serde(default = "default_positive_label")]
    pub positive: String,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            names: default_label_names(),
            positive: default_positive_label(),
        }
    }
}

impl LabelSettings {
    fn normalized(self) -> Self {
        let mut names: Vec<String> = Vec::with_capacity(self.names.len());
        for name in self.names {
            let name = name.trim().to_string();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        let mut positive = self.positive.trim().to_string();
        if positive.is_empty() {
            positive = default_positive_label();
        }
        if !names.contains(&positive) {
            names.push(positive.clone());
        }
        Self { names, positive }
    }
}

/// Sampling parameters for `train`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    #[serde(default = "default_sample_count")]
    pub sample_count: u32,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

impl TrainingSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Detection loop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Positive predictions must be strictly above this confidence.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
    /// Capture failures in a row before `run` gives up.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            cycle_interval_ms: default_cycle_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl DetectionSettings {
    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Neighbours consulted per prediction.
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Edge length of the square RGB thumbnail fed to the embedder.
    #[serde(default = "default_thumbnail_side")]
    pub thumbnail_side: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            thumbnail_side: default_thumbnail_side(),
        }
    }
}

/// Alert playback preferences.
///
/// Config keys: `sound_path`, `volume`, `tone_hz`, `tone_ms`, `device`.
/// Without a `sound_path` a sine tone of `tone_hz` for `tone_ms` is played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default)]
    pub sound_path: Option<PathBuf>,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_tone_hz")]
    pub tone_hz: f32,
    #[serde(default = "default_tone_ms")]
    pub tone_ms: u64,
    /// Preferred output device name; the host default is used when absent.
    #[serde(default)]
    pub device: Option<String>,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            sound_path: None,
            volume: default_volume(),
            tone_hz: default_tone_hz(),
            tone_ms: default_tone_ms(),
            device: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Directory of recorded frames replayed as the camera.
    #[serde(default)]
    pub frames_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub default_filter: String,
    #[serde(default = "default_true")]
    pub write_file: bool,
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            default_filter: default_log_filter(),
            write_file: default_true(),
            max_files: default_max_log_files(),
        }
    }
}
