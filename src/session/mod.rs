//! The gesture detection session.
//!
//! A [`Session`] owns the frame source, embedder, example store and alert
//! sink, and runs either a training pass or the detection loop, never both at
//! once. Progress, readiness and the current detection state are published
//! through atomics and an optional [`SessionEvent`] channel.

mod cancel;
mod decision;
mod detect;
mod signals;
mod train;

use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use crate::alert::{AlertGate, AlertGateState, AlertSink};
use crate::classifier::{ClassifyError, DatasetSnapshot, ExampleStore, Label, LabelSet};
use crate::config::AppConfig;
use crate::embedding::{EmbedError, Embedder, Embedding};
use crate::frame::{FrameError, FrameSource};

pub use cancel::CancelToken;
pub use decision::{Decision, DetectionState, decide};
pub use detect::DetectionReport;
pub use train::{TrainingReport, progress_percent};

use signals::Signals;

/// What the session is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    #[default]
    Idle,
    Training,
    Detecting,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Training => write!(f, "training"),
            Self::Detecting => write!(f, "detecting"),
        }
    }
}

/// Notifications published while the session works.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Training progress in percent; 0 once training stops.
    Progress(u8),
    DetectionChanged(DetectionState),
    AlertTriggered,
    /// A detection cycle failed and will be retried.
    CycleFailed(String),
    ModeChanged(SessionMode),
}

/// A frame could not be turned into an embedding.
#[derive(Debug, Error)]
pub enum CaptureFailure {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Embed(#[from] EmbedError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// `initialize` has not completed successfully.
    #[error("Model not ready; initialization has not completed")]
    NotReady,
    #[error("Session is busy {current}")]
    Busy { current: SessionMode },
    #[error("Sample count must be at least 1")]
    InvalidSampleCount,
    #[error("Unknown label {name:?}")]
    UnknownLabel { name: String },
    #[error("No training examples; train before running detection")]
    NoExamples,
    /// Training stopped early; the `added` examples are kept.
    #[error("Capture failed after {added} samples: {source}")]
    Capture {
        added: u32,
        source: CaptureFailure,
    },
    /// One detection cycle could not capture a frame.
    #[error("Detection cycle failed: {0}")]
    Cycle(CaptureFailure),
    /// Detection gave up after too many failures in a row.
    #[error("Detection stopped after {consecutive} consecutive capture failures: {source}")]
    CaptureHalted {
        consecutive: u32,
        source: CaptureFailure,
    },
    /// Training stopped because the store refused an example; the `added`
    /// examples are kept.
    #[error("Example store rejected sample after {added} samples: {source}")]
    Store {
        added: u32,
        source: ClassifyError,
    },
    #[error("Classifier error: {0}")]
    Classify(ClassifyError),
    /// Warm-up capture failed; the session cannot be used.
    #[error("Initialization failed: {0}")]
    Init(CaptureFailure),
    /// Saved examples were embedded by a different model.
    #[error("Initialization failed: embedder produces {embedder}-dim embeddings but stored examples are {stored}-dim")]
    IncompatibleStore { embedder: usize, stored: usize },
}

impl From<ClassifyError> for SessionError {
    fn from(error: ClassifyError) -> Self {
        match error {
            ClassifyError::NoExamples => SessionError::NoExamples,
            other => SessionError::Classify(other),
        }
    }
}

/// Timing and thresholds for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub sample_count: u32,
    pub sample_interval: Duration,
    pub confidence_threshold: f32,
    pub cycle_interval: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sample_count: config.training.sample_count,
            sample_interval: config.training.sample_interval(),
            confidence_threshold: config.detection.confidence_threshold,
            cycle_interval: config.detection.cycle_interval(),
            max_consecutive_failures: config.detection.max_consecutive_failures,
        }
    }
}

/// Collaborators handed to a new session.
pub struct SessionParts {
    pub frames: Box<dyn FrameSource>,
    pub embedder: Box<dyn Embedder>,
    pub store: Box<dyn ExampleStore>,
    pub alert_sink: Box<dyn AlertSink>,
}

/// Training and detection over one camera, model and example store.
pub struct Session {
    labels: LabelSet,
    settings: SessionSettings,
    frames: Mutex<Box<dyn FrameSource>>,
    embedder: Box<dyn Embedder>,
    store: Mutex<Box<dyn ExampleStore>>,
    alert_sink: Box<dyn AlertSink>,
    gate: AlertGate,
    mode: Mutex<SessionMode>,
    signals: Signals,
}

impl Session {
    pub fn new(labels: LabelSet, parts: SessionParts, settings: SessionSettings) -> Self {
        Self {
            labels,
            settings,
            frames: Mutex::new(parts.frames),
            embedder: parts.embedder,
            store: Mutex::new(parts.store),
            alert_sink: parts.alert_sink,
            gate: AlertGate::new(),
            mode: Mutex::new(SessionMode::Idle),
            signals: Signals::default(),
        }
    }

    /// Publish [`SessionEvent`]s to `sender` from now on.
    pub fn with_events(self, sender: Sender<SessionEvent>) -> Self {
        self.signals.set_events(sender);
        self
    }

    /// Capture and embed one frame to prove the camera and model work, and
    /// check that stored examples match the embedder's dimension.
    ///
    /// Failure is terminal: the session stays "not ready" and every later
    /// `train`/`run` call is refused.
    pub fn initialize(&self) -> Result<usize, SessionError> {
        let described = lock(&self.frames).describe();
        let embedder_dim = self.embedder.dim();
        if let Some(stored) = lock(&self.store).dim()
            && stored != embedder_dim
        {
            self.signals.set_model_ready(false);
            error!("Stored examples are {stored}-dim, embedder produces {embedder_dim}-dim");
            return Err(SessionError::IncompatibleStore {
                embedder: embedder_dim,
                stored,
            });
        }
        match self.capture() {
            Ok(embedding) => {
                self.signals.set_model_ready(true);
                info!(
                    "Model ready: {described}, embedding dim {}",
                    embedding.dim()
                );
                Ok(embedding.dim())
            }
            Err(err) => {
                self.signals.set_model_ready(false);
                error!("Initialization failed for {described}: {err}");
                Err(SessionError::Init(err))
            }
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Training progress, 0-100; 0 while not training.
    pub fn progress(&self) -> u8 {
        self.signals.progress()
    }

    pub fn model_ready(&self) -> bool {
        self.signals.model_ready()
    }

    pub fn detection_state(&self) -> DetectionState {
        self.signals.detection()
    }

    pub fn mode(&self) -> SessionMode {
        *lock(&self.mode)
    }

    pub fn alert_gate(&self) -> &AlertGate {
        &self.gate
    }

    pub fn alert_gate_state(&self) -> AlertGateState {
        self.gate.state()
    }

    pub fn example_count(&self, label: &Label) -> usize {
        lock(&self.store).example_count(label)
    }

    pub fn total_examples(&self) -> usize {
        lock(&self.store).total_examples()
    }

    pub fn snapshot(&self) -> Option<DatasetSnapshot> {
        lock(&self.store).snapshot()
    }

    fn capture(&self) -> Result<Embedding, CaptureFailure> {
        let frame = lock(&self.frames).current_frame()?;
        Ok(self.embedder.infer(&frame)?)
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.model_ready() {
            Ok(())
        } else {
            Err(SessionError::NotReady)
        }
    }

    /// Switch from idle to `target` until the returned guard drops.
    fn enter(&self, target: SessionMode) -> Result<ModeGuard<'_>, SessionError> {
        let mut mode = lock(&self.mode);
        if *mode != SessionMode::Idle {
            return Err(SessionError::Busy { current: *mode });
        }
        *mode = target;
        drop(mode);
        self.signals.emit(SessionEvent::ModeChanged(target));
        Ok(ModeGuard { session: self })
    }
}

struct ModeGuard<'a> {
    session: &'a Session,
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.session.mode) = SessionMode::Idle;
        self.session
            .signals
            .emit(SessionEvent::ModeChanged(SessionMode::Idle));
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}

#[cfg(test)]
mod tests;
