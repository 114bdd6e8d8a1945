use std::fmt;

use crate::classifier::{Label, Prediction};

/// Outcome of the most recent detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionState {
    #[default]
    NotDetected,
    Detected,
}

impl DetectionState {
    pub fn is_detected(self) -> bool {
        self == DetectionState::Detected
    }
}

impl fmt::Display for DetectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetected => write!(f, "not detected"),
            Self::Detected => write!(f, "detected"),
        }
    }
}

/// Result of one detection cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub state: DetectionState,
    pub prediction: Prediction,
    /// An alert was started by this cycle.
    pub alerted: bool,
}

/// Detected only when the positive label wins with confidence strictly above
/// `threshold`.
pub fn decide(prediction: &Prediction, positive: &Label, threshold: f32) -> DetectionState {
    if prediction.label == *positive && prediction.confidence(positive) > threshold {
        DetectionState::Detected
    } else {
        DetectionState::NotDetected
    }
}
