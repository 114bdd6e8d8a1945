//! Alert playback and the latch that debounces it.

mod gate;
mod rodio_sink;

use thiserror::Error;
use tracing::info;

pub use gate::{AlertCompletion, AlertGate, AlertGateState};
pub use rodio_sink::RodioAlertSink;

/// One-shot notification output.
///
/// `play` must not block the caller. The sink finishes `completion` once the
/// alert has ended; dropping it early (for example after a playback error)
/// also reopens the gate.
pub trait AlertSink: Send + Sync {
    fn play(&self, completion: AlertCompletion);
}

/// Sink that only logs, for muted or headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAlertSink;

impl AlertSink for SilentAlertSink {
    fn play(&self, completion: AlertCompletion) {
        info!("Alert (muted)");
        completion.finish();
    }
}

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Failed to read alert sound {path}: {source}")]
    ReadSound {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("Alert sound {path} is not a valid WAV file: {source}")]
    InvalidWav {
        path: std::path::PathBuf,
        source: hound::Error,
    },
    #[error("Alert sound {path} cannot be decoded: {reason}")]
    UnsupportedSound {
        path: std::path::PathBuf,
        reason: String,
    },
    #[error("No audio output device named {name:?}")]
    NoDevice { name: String },
    #[error("Failed to open audio output: {reason}")]
    OpenStream { reason: String },
    #[error("Failed to start audio thread: {0}")]
    Spawn(std::io::Error),
    #[error("Audio thread exited before reporting its output")]
    WorkerGone,
}
