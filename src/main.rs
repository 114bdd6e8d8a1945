//! Console front end for the touch detector.
//!
//! Reads commands from stdin: train each label, run detection, stop, and save
//! the trained examples.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use touchalert::alert::{AlertSink, RodioAlertSink, SilentAlertSink};
use touchalert::classifier::{KnnClassifier, Label, LabelSet, dataset};
use touchalert::config;
use touchalert::embedding::ThumbnailEmbedder;
use touchalert::frame::ImageDirSource;
use touchalert::logging;
use touchalert::session::{
    CancelToken, Session, SessionEvent, SessionMode, SessionParts, SessionSettings,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Default)]
struct Options {
    frames_dir: Option<PathBuf>,
    dataset: Option<PathBuf>,
    samples: Option<u32>,
    sound: Option<PathBuf>,
    mute: bool,
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    let mut config = config::load_or_default().map_err(|err| err.to_string())?;
    if let Err(err) = logging::init(&config.logging) {
        eprintln!("Logging disabled: {err}");
    }
    if let Some(samples) = options.samples {
        config.training.sample_count = samples;
    }
    if options.sound.is_some() {
        config.alert.sound_path = options.sound;
    }
    if options.dataset.is_some() {
        config.dataset_path = options.dataset;
    }
    let frames_dir = options
        .frames_dir
        .or_else(|| config.camera.frames_dir.clone())
        .ok_or_else(|| "--frames <dir> is required (or set camera.frames_dir)".to_string())?;

    let frames = ImageDirSource::open(&frames_dir).map_err(|err| err.to_string())?;
    let embedder = ThumbnailEmbedder::new(config.embedding.thumbnail_side);
    let store = match &config.dataset_path {
        Some(path) => dataset::load_classifier(path, config.classifier.k)
            .map_err(|err| err.to_string())?,
        None => KnnClassifier::new(config.classifier.k),
    };
    let alert_sink: Box<dyn AlertSink> = if options.mute {
        Box::new(SilentAlertSink)
    } else {
        Box::new(
            RodioAlertSink::spawn(&config.alert)
                .map_err(|err| format!("Audio output unavailable: {err}"))?,
        )
    };

    let (events_tx, events_rx) = mpsc::channel();
    let session = Session::new(
        LabelSet::from_settings(&config.labels),
        SessionParts {
            frames: Box::new(frames),
            embedder: Box::new(embedder),
            store: Box::new(store),
            alert_sink,
        },
        SessionSettings::from_config(&config),
    )
    .with_events(events_tx);
    let session = Arc::new(session);
    spawn_event_printer(events_rx).map_err(|err| format!("Failed to start printer: {err}"))?;

    let dim = session.initialize().map_err(|err| err.to_string())?;
    println!(
        "Ready: frames from {}, embedding dim {dim}, {} stored examples",
        frames_dir.display(),
        session.total_examples()
    );
    print_commands(session.labels());

    let mut console = Console {
        session,
        dataset_path: config.dataset_path,
        worker: None,
    };
    console.read_commands()
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(None);
    }
    let mut options = Options::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--frames" => options.frames_dir = Some(PathBuf::from(value_for(&mut it, &arg)?)),
            "--dataset" => options.dataset = Some(PathBuf::from(value_for(&mut it, &arg)?)),
            "--sound" => options.sound = Some(PathBuf::from(value_for(&mut it, &arg)?)),
            "--samples" => {
                let value = value_for(&mut it, &arg)?;
                let samples = value
                    .parse::<u32>()
                    .map_err(|_| format!("Invalid --samples value: {value}"))?;
                if samples == 0 {
                    return Err("--samples must be at least 1".to_string());
                }
                options.samples = Some(samples);
            }
            "--mute" => options.mute = true,
            _ => return Err(format!("Unknown argument: {arg}")),
        }
    }
    Ok(Some(options))
}

fn value_for(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    it.next().ok_or_else(|| format!("Missing value for {flag}"))
}

fn print_help() {
    println!("Usage: touchalert --frames <dir> [options]");
    println!();
    println!("Options:");
    println!("  --frames <dir>    Directory of frames replayed as the camera");
    println!("  --dataset <path>  Trained examples file (defaults to app data dir)");
    println!("  --samples <n>     Frames captured per training pass (default 50)");
    println!("  --sound <path>    Alert sound (WAV/MP3/OGG); a beep is used otherwise");
    println!("  --mute            Log alerts instead of playing them");
}

fn print_commands(labels: &LabelSet) {
    println!("Commands:");
    for (index, label) in labels.labels().iter().enumerate() {
        println!("  {}, train-{label}  train \"{label}\"", index + 1);
    }
    println!("  run                  start detection");
    println!("  stop                 stop training or detection");
    println!("  status               show session state");
    println!("  save                 save trained examples");
    println!("  help                 show this list");
    println!("  quit                 stop and exit");
}

fn spawn_event_printer(events: Receiver<SessionEvent>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("session-events".to_string())
        .spawn(move || {
            let mut stdout = std::io::stdout();
            for event in events {
                match event {
                    SessionEvent::Progress(0) => println!(),
                    SessionEvent::Progress(percent) => {
                        print!("\rTraining {percent:>3}%");
                        let _ = stdout.flush();
                    }
                    SessionEvent::DetectionChanged(state) => println!("Detection: {state}"),
                    SessionEvent::AlertTriggered => println!("Touch detected!"),
                    SessionEvent::CycleFailed(reason) => println!("Cycle failed: {reason}"),
                    SessionEvent::ModeChanged(_) => {}
                }
            }
        })
}

struct Worker {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

struct Console {
    session: Arc<Session>,
    dataset_path: Option<PathBuf>,
    worker: Option<Worker>,
}

impl Console {
    fn read_commands(&mut self) -> Result<(), String> {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line.map_err(|err| format!("Failed to read stdin: {err}"))?;
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if !self.dispatch(command) {
                break;
            }
        }
        self.stop();
        Ok(())
    }

    /// Returns `false` when the console should exit.
    fn dispatch(&mut self, command: &str) -> bool {
        match command {
            "run" => self.start_detection(),
            "stop" => self.stop(),
            "status" => self.status(),
            "save" => self.save(),
            "help" => print_commands(self.session.labels()),
            "quit" | "exit" => return false,
            other => match self.label_for(other) {
                Some(label) => self.start_training(label),
                None => println!("Unknown command {other:?}; type help"),
            },
        }
        true
    }

    fn label_for(&self, command: &str) -> Option<Label> {
        let labels = self.session.labels();
        if let Ok(index) = command.parse::<usize>() {
            return index
                .checked_sub(1)
                .and_then(|index| labels.labels().get(index))
                .cloned();
        }
        command
            .strip_prefix("train-")
            .and_then(|name| labels.get(name))
            .cloned()
    }

    fn start_training(&mut self, label: Label) {
        self.spawn_worker("train", move |session, cancel| {
            match session.train_with_defaults(&label, &cancel) {
                Ok(report) if report.cancelled => println!(
                    "Training {label} stopped after {} of {} samples",
                    report.added, report.requested
                ),
                Ok(report) => println!(
                    "Trained {label}: {} samples ({} total)",
                    report.added,
                    session.example_count(&label)
                ),
                Err(err) => println!("Training {label} failed: {err}"),
            }
        });
    }

    fn start_detection(&mut self) {
        self.spawn_worker("detect", |session, cancel| match session.run(&cancel) {
            Ok(report) => println!(
                "Detection stopped: {} cycles, {} detections, {} alerts",
                report.cycles, report.detections, report.alerts
            ),
            Err(err) => println!("Detection failed: {err}"),
        });
    }

    fn spawn_worker<F>(&mut self, name: &str, job: F)
    where
        F: FnOnce(Arc<Session>, CancelToken) + Send + 'static,
    {
        self.reap();
        if self.worker.is_some() {
            println!("Busy {}; type stop first", self.session.mode());
            return;
        }
        let session = Arc::clone(&self.session);
        let cancel = CancelToken::new();
        let job_cancel = cancel.clone();
        match thread::Builder::new()
            .name(format!("session-{name}"))
            .spawn(move || job(session, job_cancel))
        {
            Ok(handle) => self.worker = Some(Worker { cancel, handle }),
            Err(err) => println!("Failed to start {name}: {err}"),
        }
    }

    fn reap(&mut self) {
        if self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.handle.is_finished())
            && let Some(worker) = self.worker.take()
        {
            let _ = worker.handle.join();
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.cancel();
            if worker.handle.join().is_err() {
                println!("Worker thread panicked");
            }
        }
    }

    fn status(&mut self) {
        self.reap();
        let session = &self.session;
        println!(
            "Mode: {}, model ready: {}, progress: {}%, detection: {}, alert: {:?}",
            session.mode(),
            session.model_ready(),
            session.progress(),
            session.detection_state(),
            session.alert_gate_state()
        );
        for label in session.labels().labels() {
            println!("  {label}: {} examples", session.example_count(label));
        }
        if session.mode() == SessionMode::Idle && session.total_examples() > 0 {
            match session.probe() {
                Ok(decision) => println!(
                    "  current frame: {} ({:.2})",
                    decision.prediction.label,
                    decision.prediction.confidence(&decision.prediction.label)
                ),
                Err(err) => println!("  probe failed: {err}"),
            }
        }
    }

    fn save(&self) {
        let Some(path) = &self.dataset_path else {
            println!("No dataset path configured");
            return;
        };
        let Some(snapshot) = self.session.snapshot() else {
            println!("Nothing to save");
            return;
        };
        match dataset::save(path, &snapshot) {
            Ok(()) => println!(
                "Saved {} examples to {}",
                snapshot.examples.len(),
                path.display()
            ),
            Err(err) => println!("Save failed: {err}"),
        }
    }
}
