use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Whether a new alert may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertGateState {
    Eligible,
    CoolingDown,
}

#[derive(Debug)]
struct GateInner {
    eligible: AtomicBool,
    plays: AtomicU64,
    completions: AtomicU64,
}

/// Single-slot latch keeping at most one alert in flight.
///
/// [`AlertGate::try_acquire`] closes the gate and hands out the only
/// [`AlertCompletion`]; the gate reopens when that handle is finished or
/// dropped, from whichever thread the sink reports completion on.
#[derive(Debug, Clone)]
pub struct AlertGate {
    inner: Arc<GateInner>,
}

impl Default for AlertGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertGate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                eligible: AtomicBool::new(true),
                plays: AtomicU64::new(0),
                completions: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> AlertGateState {
        if self.inner.eligible.load(Ordering::Acquire) {
            AlertGateState::Eligible
        } else {
            AlertGateState::CoolingDown
        }
    }

    /// Close the gate if it is open. `None` means an alert is still playing.
    pub fn try_acquire(&self) -> Option<AlertCompletion> {
        self.inner
            .eligible
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.inner.plays.fetch_add(1, Ordering::AcqRel);
        Some(AlertCompletion {
            inner: Some(Arc::clone(&self.inner)),
        })
    }

    /// Alerts started since the gate was created.
    pub fn plays(&self) -> u64 {
        self.inner.plays.load(Ordering::Acquire)
    }

    /// Alerts reported finished since the gate was created.
    pub fn completions(&self) -> u64 {
        self.inner.completions.load(Ordering::Acquire)
    }
}

/// Completion signal for one alert. Reopens the gate exactly once.
#[derive(Debug)]
#[must_use = "dropping the completion immediately reopens the alert gate"]
pub struct AlertCompletion {
    inner: Option<Arc<GateInner>>,
}

impl AlertCompletion {
    /// Report that the alert finished playing.
    pub fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.completions.fetch_add(1, Ordering::AcqRel);
            inner.eligible.store(true, Ordering::Release);
        }
    }
}

impl Drop for AlertCompletion {
    fn drop(&mut self) {
        self.release();
    }
}
