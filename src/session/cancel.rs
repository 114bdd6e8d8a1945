use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Shared stop flag for `train` and `run`.
///
/// Loops check it at every iteration boundary, and [`CancelToken::sleep`]
/// wakes early when it is raised. A cancelled token stays cancelled; start
/// each operation with a fresh one.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (flag, wake) = &*self.inner;
        *flag.lock().unwrap_or_else(|err| err.into_inner()) = true;
        wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Suspend for `duration` or until cancelled. Returns `true` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, wake) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(|err| err.into_inner());
        if *guard || duration.is_zero() {
            return *guard;
        }
        let (guard, _) = wake
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(|err| err.into_inner());
        *guard
    }
}
