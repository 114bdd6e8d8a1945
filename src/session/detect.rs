use tracing::{debug, info, warn};

use super::{
    CancelToken, CaptureFailure, Decision, DetectionState, Session, SessionError, SessionEvent,
    SessionMode, decide, lock,
};
use crate::classifier::ClassifyError;

/// Counters from a finished detection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionReport {
    pub cycles: u64,
    pub detections: u64,
    pub alerts: u64,
    pub failures: u64,
}

enum CycleError {
    Capture(CaptureFailure),
    Classify(ClassifyError),
}

impl Session {
    /// Classify live frames until `cancel` is raised.
    ///
    /// Each cycle captures, classifies and decides, then waits the configured
    /// cycle interval. A failed capture is logged and retried on the next
    /// cycle; after `max_consecutive_failures` failures in a row the loop
    /// stops with [`SessionError::CaptureHalted`].
    pub fn run(&self, cancel: &CancelToken) -> Result<DetectionReport, SessionError> {
        self.ensure_ready()?;
        let _mode = self.enter(SessionMode::Detecting)?;
        if lock(&self.store).total_examples() == 0 {
            return Err(SessionError::NoExamples);
        }
        info!(
            "Detection started (threshold {}, every {:?})",
            self.settings.confidence_threshold, self.settings.cycle_interval
        );

        let mut report = DetectionReport::default();
        let mut consecutive_failures = 0u32;
        let outcome = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }
            report.cycles += 1;
            match self.cycle() {
                Ok(decision) => {
                    consecutive_failures = 0;
                    if decision.state.is_detected() {
                        report.detections += 1;
                    }
                    if decision.alerted {
                        report.alerts += 1;
                    }
                }
                Err(CycleError::Capture(err)) => {
                    consecutive_failures += 1;
                    report.failures += 1;
                    warn!(
                        "Detection cycle {} failed ({consecutive_failures} in a row): {err}",
                        report.cycles
                    );
                    self.signals.emit(SessionEvent::CycleFailed(err.to_string()));
                    if consecutive_failures >= self.settings.max_consecutive_failures {
                        break Err(SessionError::CaptureHalted {
                            consecutive: consecutive_failures,
                            source: err,
                        });
                    }
                }
                Err(CycleError::Classify(err)) => break Err(err.into()),
            }
            if cancel.sleep(self.settings.cycle_interval) {
                break Ok(());
            }
        };

        self.signals.set_detection(DetectionState::NotDetected);
        match &outcome {
            Ok(()) => info!(
                "Detection stopped after {} cycles ({} detections, {} alerts, {} failures)",
                report.cycles, report.detections, report.alerts, report.failures
            ),
            Err(err) => warn!("Detection halted: {err}"),
        }
        outcome.map(|()| report)
    }

    /// Run a single detection cycle outside the loop.
    pub fn detect_once(&self) -> Result<Decision, SessionError> {
        self.ensure_ready()?;
        let _mode = self.enter(SessionMode::Detecting)?;
        self.cycle().map_err(|err| match err {
            CycleError::Capture(source) => SessionError::Cycle(source),
            CycleError::Classify(source) => source.into(),
        })
    }

    /// Classify the current frame without touching the detection state or
    /// the alert gate.
    pub fn probe(&self) -> Result<Decision, SessionError> {
        self.ensure_ready()?;
        let _mode = self.enter(SessionMode::Detecting)?;
        let embedding = self.capture().map_err(SessionError::Cycle)?;
        let prediction = lock(&self.store).predict(&embedding)?;
        let state = decide(
            &prediction,
            self.labels.positive(),
            self.settings.confidence_threshold,
        );
        Ok(Decision {
            state,
            prediction,
            alerted: false,
        })
    }

    fn cycle(&self) -> Result<Decision, CycleError> {
        let embedding = match self.capture() {
            Ok(embedding) => embedding,
            Err(err) => {
                self.signals.set_detection(DetectionState::NotDetected);
                return Err(CycleError::Capture(err));
            }
        };
        let prediction = match lock(&self.store).predict(&embedding) {
            Ok(prediction) => prediction,
            Err(err) => {
                self.signals.set_detection(DetectionState::NotDetected);
                return Err(CycleError::Classify(err));
            }
        };

        let positive = self.labels.positive();
        let state = decide(&prediction, positive, self.settings.confidence_threshold);
        self.signals.set_detection(state);

        let mut alerted = false;
        if state.is_detected() {
            match self.gate.try_acquire() {
                Some(completion) => {
                    info!(
                        "{positive} detected ({:.2}); playing alert",
                        prediction.confidence(positive)
                    );
                    self.signals.emit(SessionEvent::AlertTriggered);
                    self.alert_sink.play(completion);
                    alerted = true;
                }
                None => debug!("{positive} detected; alert still playing"),
            }
        } else {
            debug!(
                "Not detected ({} {:.2})",
                prediction.label,
                prediction.confidence(&prediction.label)
            );
        }
        Ok(Decision {
            state,
            prediction,
            alerted,
        })
    }
}
