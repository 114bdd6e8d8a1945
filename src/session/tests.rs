use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};

use super::*;
use crate::alert::AlertCompletion;
use crate::classifier::{KnnClassifier, Prediction};
use crate::frame::Frame;

struct FakeFrames {
    calls: u64,
    fail_calls: Vec<u64>,
    fail_from: Option<u64>,
}

impl FakeFrames {
    fn healthy() -> Self {
        Self {
            calls: 0,
            fail_calls: Vec::new(),
            fail_from: None,
        }
    }

    fn failing_from(call: u64) -> Self {
        Self {
            fail_from: Some(call),
            ..Self::healthy()
        }
    }

    fn failing_on(calls: &[u64]) -> Self {
        Self {
            fail_calls: calls.to_vec(),
            ..Self::healthy()
        }
    }
}

impl FrameSource for FakeFrames {
    fn current_frame(&mut self) -> Result<Frame, FrameError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_calls.contains(&call) || self.fail_from.is_some_and(|from| call >= from) {
            return Err(FrameError::Device {
                reason: "camera revoked".into(),
            });
        }
        let shade = (call % 256) as u8;
        Ok(Frame::new(RgbImage::from_pixel(2, 2, Rgb([shade, 0, 0])), call))
    }
}

struct FakeEmbedder {
    dim: usize,
}

impl Embedder for FakeEmbedder {
    fn infer(&self, frame: &Frame) -> Result<Embedding, EmbedError> {
        let mut values = vec![0.0; self.dim];
        values[0] = 1.0;
        values[1] = frame.sequence() as f32;
        Ok(Embedding::new(values))
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

/// Store that replays canned predictions and counts added examples.
#[derive(Default)]
struct ScriptedStore {
    preloaded: usize,
    added: Vec<Label>,
    predictions: Mutex<VecDeque<Result<Prediction, ClassifyError>>>,
    cancel_when_exhausted: Option<CancelToken>,
    cancel_after_adds: Option<(usize, CancelToken)>,
    reject_after_adds: Option<usize>,
}

impl ExampleStore for ScriptedStore {
    fn add_example(&mut self, embedding: Embedding, label: Label) -> Result<(), ClassifyError> {
        if self.reject_after_adds == Some(self.added.len()) {
            return Err(ClassifyError::DimensionMismatch {
                expected: embedding.dim() + 1,
                actual: embedding.dim(),
            });
        }
        self.added.push(label);
        if let Some((after, token)) = &self.cancel_after_adds
            && self.added.len() == *after
        {
            token.cancel();
        }
        Ok(())
    }

    fn predict(&self, _embedding: &Embedding) -> Result<Prediction, ClassifyError> {
        let next = self.predictions.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                if let Some(token) = &self.cancel_when_exhausted {
                    token.cancel();
                }
                Ok(prediction("untouched", 1.0))
            }
        }
    }

    fn example_count(&self, label: &Label) -> usize {
        self.added.iter().filter(|added| *added == label).count()
    }

    fn total_examples(&self) -> usize {
        self.preloaded + self.added.len()
    }
}

/// Sink that holds completions until the test finishes them.
#[derive(Clone, Default)]
struct HeldSink {
    plays: Arc<AtomicUsize>,
    pending: Arc<Mutex<Vec<AlertCompletion>>>,
}

impl HeldSink {
    fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    fn finish_all(&self) {
        for completion in self.pending.lock().unwrap().drain(..) {
            completion.finish();
        }
    }
}

impl AlertSink for HeldSink {
    fn play(&self, completion: AlertCompletion) {
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().unwrap().push(completion);
    }
}

fn prediction(label: &str, confidence: f32) -> Prediction {
    Prediction {
        label: Label::new(label),
        confidences: BTreeMap::from([(Label::new(label), confidence)]),
    }
}

fn touched() -> Label {
    Label::new("touched")
}

fn untouched() -> Label {
    Label::new("untouched")
}

fn fast_settings() -> SessionSettings {
    SessionSettings {
        sample_count: 5,
        sample_interval: Duration::ZERO,
        confidence_threshold: 0.8,
        cycle_interval: Duration::from_millis(1),
        max_consecutive_failures: 3,
    }
}

fn build(
    frames: FakeFrames,
    store: Box<dyn ExampleStore>,
) -> (Session, HeldSink, Receiver<SessionEvent>) {
    build_with_dim(frames, store, 2)
}

fn build_with_dim(
    frames: FakeFrames,
    store: Box<dyn ExampleStore>,
    embedding_dim: usize,
) -> (Session, HeldSink, Receiver<SessionEvent>) {
    let sink = HeldSink::default();
    let (tx, rx) = mpsc::channel();
    let session = Session::new(
        LabelSet::new(["untouched", "touched"], "touched"),
        SessionParts {
            frames: Box::new(frames),
            embedder: Box::new(FakeEmbedder { dim: embedding_dim }),
            store,
            alert_sink: Box::new(sink.clone()),
        },
        fast_settings(),
    )
    .with_events(tx);
    (session, sink, rx)
}

fn ready(frames: FakeFrames, store: Box<dyn ExampleStore>) -> (Session, HeldSink, Receiver<SessionEvent>) {
    let built = build(frames, store);
    built.0.initialize().unwrap();
    built
}

fn progress_events(rx: &Receiver<SessionEvent>) -> Vec<u8> {
    rx.try_iter()
        .filter_map(|event| match event {
            SessionEvent::Progress(percent) => Some(percent),
            _ => None,
        })
        .collect()
}

fn scripted(predictions: Vec<Result<Prediction, ClassifyError>>) -> ScriptedStore {
    ScriptedStore {
        preloaded: 1,
        predictions: Mutex::new(predictions.into()),
        ..ScriptedStore::default()
    }
}

#[test]
fn training_adds_one_example_per_sample_and_reports_progress() {
    let (session, _, rx) = ready(FakeFrames::healthy(), Box::new(KnnClassifier::new(3)));
    let report = session
        .train(&touched(), 50, Duration::ZERO, &CancelToken::new())
        .unwrap();

    assert_eq!(report.added, 50);
    assert!(!report.cancelled);
    assert_eq!(session.example_count(&touched()), 50);
    assert_eq!(session.example_count(&untouched()), 0);

    let mut expected: Vec<u8> = (1..=50).map(|i| (i * 2) as u8).collect();
    expected.push(0);
    assert_eq!(progress_events(&rx), expected);
    assert_eq!(session.progress(), 0);
    assert_eq!(session.mode(), SessionMode::Idle);
}

#[test]
fn repeated_training_accumulates_per_label() {
    let (session, _, _) = ready(FakeFrames::healthy(), Box::new(KnnClassifier::new(3)));
    let cancel = CancelToken::new();
    session.train(&untouched(), 4, Duration::ZERO, &cancel).unwrap();
    session.train(&touched(), 3, Duration::ZERO, &cancel).unwrap();
    session.train_with_defaults(&touched(), &cancel).unwrap();
    assert_eq!(session.example_count(&untouched()), 4);
    assert_eq!(session.example_count(&touched()), 8);
    assert_eq!(session.total_examples(), 12);
}

#[test]
fn capture_failure_keeps_examples_already_added() {
    // Call 0 is the warm-up capture; training samples start at call 1.
    let (session, _, rx) = ready(FakeFrames::failing_from(8), Box::new(KnnClassifier::new(3)));
    let err = session
        .train(&touched(), 20, Duration::ZERO, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Capture {
            added: 7,
            source: CaptureFailure::Frame(FrameError::Device { .. })
        }
    ));
    assert_eq!(session.example_count(&touched()), 7);
    assert_eq!(progress_events(&rx).last(), Some(&0));
    assert_eq!(session.progress(), 0);
    assert_eq!(session.mode(), SessionMode::Idle);
}

#[test]
fn training_input_is_validated() {
    let (session, _, _) = ready(FakeFrames::healthy(), Box::new(KnnClassifier::new(3)));
    let cancel = CancelToken::new();
    assert!(matches!(
        session.train(&touched(), 0, Duration::ZERO, &cancel),
        Err(SessionError::InvalidSampleCount)
    ));
    assert!(matches!(
        session.train(&Label::new("waving"), 3, Duration::ZERO, &cancel),
        Err(SessionError::UnknownLabel { name }) if name == "waving"
    ));
    assert_eq!(session.total_examples(), 0);
}

#[test]
fn cancelled_training_reports_partial_count() {
    let cancel = CancelToken::new();
    let store = ScriptedStore {
        cancel_after_adds: Some((3, cancel.clone())),
        ..ScriptedStore::default()
    };
    let (session, _, _) = ready(FakeFrames::healthy(), Box::new(store));
    let report = session
        .train(&touched(), 10, Duration::from_secs(30), &cancel)
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.added, 3);
    assert_eq!(session.example_count(&touched()), 3);
    assert_eq!(session.progress(), 0);
}

#[test]
fn operations_require_successful_initialization() {
    let (session, _, _) = build(FakeFrames::failing_from(0), Box::new(KnnClassifier::new(3)));
    assert!(matches!(session.initialize(), Err(SessionError::Init(_))));
    assert!(!session.model_ready());
    assert!(matches!(
        session.train(&touched(), 1, Duration::ZERO, &CancelToken::new()),
        Err(SessionError::NotReady)
    ));
    assert!(matches!(
        session.run(&CancelToken::new()),
        Err(SessionError::NotReady)
    ));
}

#[test]
fn confident_touch_plays_once_until_alert_finishes() {
    let store = scripted(vec![
        Ok(prediction("touched", 0.95)),
        Ok(prediction("touched", 0.95)),
        Ok(prediction("touched", 0.95)),
    ]);
    let (session, sink, _) = ready(FakeFrames::healthy(), Box::new(store));

    let first = session.detect_once().unwrap();
    assert_eq!(first.state, DetectionState::Detected);
    assert!(first.alerted);
    assert_eq!(sink.plays(), 1);
    assert_eq!(session.alert_gate_state(), AlertGateState::CoolingDown);

    let second = session.detect_once().unwrap();
    assert_eq!(second.state, DetectionState::Detected);
    assert!(!second.alerted);
    assert_eq!(sink.plays(), 1);

    sink.finish_all();
    assert_eq!(session.alert_gate_state(), AlertGateState::Eligible);
    let third = session.detect_once().unwrap();
    assert!(third.alerted);
    assert_eq!(sink.plays(), 2);

    let gate = session.alert_gate();
    assert_eq!(gate.plays() - gate.completions(), 1);
}

#[test]
fn low_confidence_and_wrong_label_are_not_detected() {
    let store = scripted(vec![
        Ok(prediction("touched", 0.8)),
        Ok(prediction("untouched", 0.99)),
    ]);
    let (session, sink, _) = ready(FakeFrames::healthy(), Box::new(store));
    assert_eq!(
        session.detect_once().unwrap().state,
        DetectionState::NotDetected
    );
    assert_eq!(
        session.detect_once().unwrap().state,
        DetectionState::NotDetected
    );
    assert_eq!(sink.plays(), 0);
    assert_eq!(session.alert_gate_state(), AlertGateState::Eligible);
}

#[test]
fn classifying_without_examples_fails_cleanly() {
    let (session, sink, _) = ready(FakeFrames::healthy(), Box::new(KnnClassifier::new(3)));
    assert!(matches!(session.detect_once(), Err(SessionError::NoExamples)));
    assert_eq!(session.detection_state(), DetectionState::NotDetected);
    assert!(matches!(
        session.run(&CancelToken::new()),
        Err(SessionError::NoExamples)
    ));
    assert_eq!(session.mode(), SessionMode::Idle);
    assert_eq!(sink.plays(), 0);
}

#[test]
fn run_debounces_alerts_and_stops_on_cancel() {
    let cancel = CancelToken::new();
    let mut store = scripted(vec![
        Ok(prediction("touched", 0.95)),
        Ok(prediction("touched", 0.95)),
        Ok(prediction("touched", 0.95)),
        Ok(prediction("untouched", 1.0)),
        Ok(prediction("touched", 0.9)),
    ]);
    store.cancel_when_exhausted = Some(cancel.clone());
    let (session, sink, rx) = ready(FakeFrames::healthy(), Box::new(store));

    let report = session.run(&cancel).unwrap();
    assert_eq!(report.cycles, 6);
    assert_eq!(report.detections, 4);
    assert_eq!(report.alerts, 1);
    assert_eq!(report.failures, 0);
    assert_eq!(sink.plays(), 1);
    assert_eq!(session.detection_state(), DetectionState::NotDetected);
    assert_eq!(session.mode(), SessionMode::Idle);

    let events: Vec<SessionEvent> = rx.try_iter().collect();
    let alerts = events
        .iter()
        .filter(|event| **event == SessionEvent::AlertTriggered)
        .count();
    assert_eq!(alerts, 1);
    assert!(events.contains(&SessionEvent::DetectionChanged(DetectionState::Detected)));
}

#[test]
fn run_retries_transient_capture_failures() {
    let cancel = CancelToken::new();
    let mut store = scripted(vec![
        Ok(prediction("untouched", 1.0)),
        Ok(prediction("untouched", 1.0)),
    ]);
    store.cancel_when_exhausted = Some(cancel.clone());
    // Calls 1 and 2 fail, below the limit of three in a row.
    let (session, _, rx) = ready(FakeFrames::failing_on(&[1, 2]), Box::new(store));

    let report = session.run(&cancel).unwrap();
    assert_eq!(report.failures, 2);
    assert_eq!(report.cycles, 5);
    let failures = rx
        .try_iter()
        .filter(|event| matches!(event, SessionEvent::CycleFailed(_)))
        .count();
    assert_eq!(failures, 2);
}

#[test]
fn run_halts_after_consecutive_failures() {
    let (session, _, _) = ready(FakeFrames::failing_from(1), Box::new(scripted(Vec::new())));
    let err = session.run(&CancelToken::new()).unwrap_err();
    assert!(matches!(
        err,
        SessionError::CaptureHalted { consecutive: 3, .. }
    ));
    assert_eq!(session.mode(), SessionMode::Idle);
}

#[test]
fn training_is_rejected_while_detecting() {
    let cancel = CancelToken::new();
    let store = scripted(Vec::new());
    let (session, _, _) = ready(FakeFrames::healthy(), Box::new(store));
    let session = Arc::new(session);

    let runner = {
        let session = Arc::clone(&session);
        let cancel = cancel.clone();
        std::thread::spawn(move || session.run(&cancel))
    };
    let deadline = Instant::now() + Duration::from_secs(5);
    while session.mode() != SessionMode::Detecting && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }

    let err = session
        .train(&touched(), 1, Duration::ZERO, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Busy {
            current: SessionMode::Detecting
        }
    ));
    assert!(matches!(session.detect_once(), Err(SessionError::Busy { .. })));

    cancel.cancel();
    runner.join().unwrap().unwrap();
    assert_eq!(session.mode(), SessionMode::Idle);
}

#[test]
fn initialization_rejects_examples_of_another_dimension() {
    let mut store = KnnClassifier::new(3);
    store
        .add_example(Embedding::new(vec![1.0, 0.0]), touched())
        .unwrap();
    let (session, sink, _) = build_with_dim(FakeFrames::healthy(), Box::new(store), 3);

    assert!(matches!(
        session.initialize(),
        Err(SessionError::IncompatibleStore {
            embedder: 3,
            stored: 2
        })
    ));
    assert!(!session.model_ready());
    assert!(matches!(
        session.train(&touched(), 1, Duration::ZERO, &CancelToken::new()),
        Err(SessionError::NotReady)
    ));
    assert!(matches!(
        session.run(&CancelToken::new()),
        Err(SessionError::NotReady)
    ));
    assert_eq!(session.total_examples(), 1);
    assert_eq!(sink.plays(), 0);
}

#[test]
fn matching_stored_examples_initialize() {
    let mut store = KnnClassifier::new(3);
    store
        .add_example(Embedding::new(vec![1.0, 0.0, 0.5]), touched())
        .unwrap();
    let (session, _, _) = build_with_dim(FakeFrames::healthy(), Box::new(store), 3);
    assert_eq!(session.initialize().unwrap(), 3);
    assert!(session.model_ready());
}

#[test]
fn store_rejection_keeps_examples_already_added() {
    let store = ScriptedStore {
        reject_after_adds: Some(4),
        ..ScriptedStore::default()
    };
    let (session, _, rx) = ready(FakeFrames::healthy(), Box::new(store));
    let err = session
        .train(&touched(), 10, Duration::ZERO, &CancelToken::new())
        .unwrap_err();

    assert!(matches!(
        err,
        SessionError::Store {
            added: 4,
            source: ClassifyError::DimensionMismatch { .. }
        }
    ));
    assert_eq!(session.example_count(&touched()), 4);
    assert_eq!(progress_events(&rx).last(), Some(&0));
    assert_eq!(session.mode(), SessionMode::Idle);
}

#[test]
fn probe_classifies_without_alerting() {
    let store = scripted(vec![
        Ok(prediction("touched", 0.95)),
        Ok(prediction("touched", 0.95)),
    ]);
    let (session, sink, rx) = ready(FakeFrames::healthy(), Box::new(store));

    let probed = session.probe().unwrap();
    assert_eq!(probed.state, DetectionState::Detected);
    assert!(!probed.alerted);
    assert_eq!(sink.plays(), 0);
    assert_eq!(session.alert_gate_state(), AlertGateState::Eligible);
    assert_eq!(session.detection_state(), DetectionState::NotDetected);
    assert!(
        !rx.try_iter()
            .any(|event| matches!(event, SessionEvent::AlertTriggered))
    );

    assert!(session.detect_once().unwrap().alerted);
    assert_eq!(sink.plays(), 1);
}
