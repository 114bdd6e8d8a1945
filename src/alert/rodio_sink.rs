use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use rodio::source::SineWave;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{debug, info, warn};

use super::{AlertCompletion, AlertError, AlertSink};
use crate::config::AlertSettings;

/// Tone gain keeps the synthesised beep below clipping.
const TONE_GAIN: f32 = 0.3;

#[derive(Clone)]
enum AlertClip {
    Tone { hz: f32, duration: Duration },
    Encoded(Arc<[u8]>),
}

impl AlertClip {
    fn from_settings(settings: &AlertSettings) -> Result<Self, AlertError> {
        match &settings.sound_path {
            Some(path) => load_sound(path),
            None => Ok(AlertClip::Tone {
                hz: settings.tone_hz,
                duration: Duration::from_millis(settings.tone_ms),
            }),
        }
    }
}

enum AlertCommand {
    Play(AlertCompletion),
}

/// Plays the alert on a dedicated audio thread that owns the output stream.
///
/// The thread blocks on each alert until it has drained, then finishes the
/// completion so the detector may alert again.
pub struct RodioAlertSink {
    commands: Sender<AlertCommand>,
    device_name: String,
}

impl RodioAlertSink {
    /// Load the clip, open the output device and start the audio thread.
    ///
    /// Any failure here is returned before the detector starts.
    pub fn spawn(settings: &AlertSettings) -> Result<Self, AlertError> {
        let clip = AlertClip::from_settings(settings)?;
        let volume = settings.volume;
        let device = settings.device.clone();
        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<String, AlertError>>(1);

        thread::Builder::new()
            .name("alert-audio".to_string())
            .spawn(move || {
                let mut stream = match open_stream(device.as_deref()) {
                    Ok((stream, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        stream
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                stream.log_on_drop(false);
                run_audio_thread(&stream, &clip, volume, command_rx);
            })
            .map_err(AlertError::Spawn)?;

        let device_name = ready_rx.recv().map_err(|_| AlertError::WorkerGone)??;
        info!("Alert output ready on {device_name}");
        Ok(Self {
            commands,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl AlertSink for RodioAlertSink {
    fn play(&self, completion: AlertCompletion) {
        if self.commands.send(AlertCommand::Play(completion)).is_err() {
            // The returned command drops its completion, reopening the gate.
            warn!("Alert audio thread is gone; alert skipped");
        }
    }
}

fn run_audio_thread(
    stream: &OutputStream,
    clip: &AlertClip,
    volume: f32,
    commands: Receiver<AlertCommand>,
) {
    while let Ok(AlertCommand::Play(completion)) = commands.recv() {
        let sink = Sink::connect_new(stream.mixer());
        sink.set_volume(volume);
        match clip {
            AlertClip::Tone { hz, duration } => {
                sink.append(SineWave::new(*hz).take_duration(*duration).amplify(TONE_GAIN));
            }
            AlertClip::Encoded(bytes) => match Decoder::new(Cursor::new(Arc::clone(bytes))) {
                Ok(decoder) => sink.append(decoder),
                Err(err) => {
                    warn!("Alert sound failed to decode: {err}");
                    continue;
                }
            },
        }
        sink.sleep_until_end();
        debug!("Alert finished");
        completion.finish();
    }
    debug!("Alert audio thread exiting");
}

fn open_stream(device_name: Option<&str>) -> Result<(OutputStream, String), AlertError> {
    let Some(name) = device_name else {
        let stream = OutputStreamBuilder::open_default_stream().map_err(|err| {
            AlertError::OpenStream {
                reason: err.to_string(),
            }
        })?;
        return Ok((stream, "default output".to_string()));
    };
    let host = cpal::default_host();
    let mut devices = host
        .output_devices()
        .map_err(|err| AlertError::OpenStream {
            reason: err.to_string(),
        })?;
    let device = devices
        .find(|device| device.name().is_ok_and(|candidate| candidate == name))
        .ok_or_else(|| AlertError::NoDevice {
            name: name.to_string(),
        })?;
    let stream = OutputStreamBuilder::from_device(device)
        .and_then(|builder| builder.open_stream())
        .map_err(|err| AlertError::OpenStream {
            reason: err.to_string(),
        })?;
    Ok((stream, name.to_string()))
}

fn load_sound(path: &Path) -> Result<AlertClip, AlertError> {
    let bytes: Arc<[u8]> = std::fs::read(path)
        .map_err(|source| AlertError::ReadSound {
            path: path.to_path_buf(),
            source,
        })?
        .into();
    if is_wav(path) {
        let reader =
            hound::WavReader::new(Cursor::new(&bytes[..])).map_err(|source| {
                AlertError::InvalidWav {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        let spec = reader.spec();
        let seconds = reader.duration() as f32 / spec.sample_rate.max(1) as f32;
        info!(
            "Alert sound {}: {:.2}s, {} Hz, {} ch",
            path.display(),
            seconds,
            spec.sample_rate,
            spec.channels
        );
    } else {
        Decoder::new(Cursor::new(Arc::clone(&bytes))).map_err(|err| {
            AlertError::UnsupportedSound {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        })?;
        info!("Alert sound {}", path.display());
    }
    Ok(AlertClip::Encoded(bytes))
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}
