use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::Sender;

use super::{DetectionState, SessionEvent};

/// Observable session values, readable from any thread.
#[derive(Debug, Default)]
pub(super) struct Signals {
    progress: AtomicU8,
    model_ready: AtomicBool,
    detected: AtomicBool,
    events: Mutex<Option<Sender<SessionEvent>>>,
}

impl Signals {
    pub(super) fn set_events(&self, sender: Sender<SessionEvent>) {
        *self.events.lock().unwrap_or_else(|err| err.into_inner()) = Some(sender);
    }

    pub(super) fn emit(&self, event: SessionEvent) {
        let guard = self.events.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(sender) = guard.as_ref() {
            // A dropped receiver just means nobody is watching.
            let _ = sender.send(event);
        }
    }

    pub(super) fn progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    pub(super) fn set_progress(&self, percent: u8) {
        self.progress.store(percent, Ordering::Release);
        self.emit(SessionEvent::Progress(percent));
    }

    pub(super) fn model_ready(&self) -> bool {
        self.model_ready.load(Ordering::Acquire)
    }

    pub(super) fn set_model_ready(&self, ready: bool) {
        self.model_ready.store(ready, Ordering::Release);
    }

    pub(super) fn detection(&self) -> DetectionState {
        if self.detected.load(Ordering::Acquire) {
            DetectionState::Detected
        } else {
            DetectionState::NotDetected
        }
    }

    /// Record `state`, emitting an event only when it changes.
    pub(super) fn set_detection(&self, state: DetectionState) {
        let previous = self.detected.swap(state.is_detected(), Ordering::AcqRel);
        if previous != state.is_detected() {
            self.emit(SessionEvent::DetectionChanged(state));
        }
    }
}
