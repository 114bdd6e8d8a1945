//! Persisted settings for the detector.
//!
//! Settings live in `config.toml` under the app root. Every field carries a
//! serde default so partial or older files keep loading.

mod defaults;
mod errors;
mod io;
mod types;

pub use errors::ConfigError;
pub use io::{CONFIG_FILE_NAME, config_path, load_from, load_or_default, save, save_to_path};
pub use types::{
    AlertSettings, AppConfig, CameraSettings, ClassifierSettings, DetectionSettings,
    EmbeddingSettings, LabelSettings, LoggingSettings, TrainingSettings,
};
