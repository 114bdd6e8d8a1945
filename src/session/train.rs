use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CancelToken, Session, SessionError, SessionMode, lock};
use crate::classifier::Label;

/// Outcome of a training pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingReport {
    pub label: Label,
    pub requested: u32,
    pub added: u32,
    pub cancelled: bool,
}

/// Percentage of `done` out of `total`, rounded to the nearest integer.
pub fn progress_percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    (done as f64 / total as f64 * 100.0).round().min(100.0) as u8
}

/// Zeroes the published progress however the training pass ends.
struct ProgressReset<'a> {
    session: &'a Session,
}

impl Drop for ProgressReset<'_> {
    fn drop(&mut self) {
        self.session.signals.set_progress(0);
    }
}

impl Session {
    /// Train `label` with the configured sample count and interval.
    pub fn train_with_defaults(
        &self,
        label: &Label,
        cancel: &CancelToken,
    ) -> Result<TrainingReport, SessionError> {
        self.train(
            label,
            self.settings.sample_count,
            self.settings.sample_interval,
            cancel,
        )
    }

    /// Capture `sample_count` frames, one every `sample_interval`, and store
    /// each embedding as an example of `label`.
    ///
    /// Examples are added in capture order. If a capture fails the pass stops
    /// with [`SessionError::Capture`], and if the store rejects an example it
    /// stops with [`SessionError::Store`]. Either way the examples already
    /// added stay.
    pub fn train(
        &self,
        label: &Label,
        sample_count: u32,
        sample_interval: Duration,
        cancel: &CancelToken,
    ) -> Result<TrainingReport, SessionError> {
        self.ensure_ready()?;
        if !self.labels.contains(label) {
            return Err(SessionError::UnknownLabel {
                name: label.to_string(),
            });
        }
        if sample_count == 0 {
            return Err(SessionError::InvalidSampleCount);
        }
        let _mode = self.enter(SessionMode::Training)?;
        let _reset = ProgressReset { session: self };
        info!("Training {label}: {sample_count} samples every {sample_interval:?}");

        let mut report = TrainingReport {
            label: label.clone(),
            requested: sample_count,
            added: 0,
            cancelled: false,
        };
        for sample in 1..=sample_count {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let embedding = self.capture().map_err(|source| {
                warn!("Training {label} aborted at sample {sample}: {source}");
                SessionError::Capture {
                    added: report.added,
                    source,
                }
            })?;
            lock(&self.store)
                .add_example(embedding, label.clone())
                .map_err(|source| {
                    warn!("Training {label} aborted at sample {sample}: {source}");
                    SessionError::Store {
                        added: report.added,
                        source,
                    }
                })?;
            report.added = sample;

            let percent = progress_percent(sample, sample_count);
            self.signals.set_progress(percent);
            debug!("Training {label} {percent}%");

            if sample < sample_count && cancel.sleep(sample_interval) {
                report.cancelled = true;
                break;
            }
        }

        if report.cancelled {
            info!(
                "Training {label} cancelled after {} of {} samples",
                report.added, report.requested
            );
        } else {
            info!("Training {label} finished: {} samples", report.added);
        }
        Ok(report)
    }
}
