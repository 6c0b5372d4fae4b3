//! Audio sources
//!
//! The engine treats audio as an exclusively-owned collaborator that
//! announces readiness on the event bus. Live capture uses cpal on a
//! dedicated thread that owns the input stream; the engine only ever
//! sees the sample channel and a stop handle. File playback exists for
//! offline runs and tests.

use crate::error::{DialError, DialResult};
use crate::events::{EngineEvent, EventBus};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tracing::{debug, info, warn};

/// Opaque handle to the in-flight audio, consumed by the recognizer.
pub enum AudioStream {
    File(PathBuf),
    Live(Receiver<Vec<i16>>),
}

/// An audio capture or playback source. `start` issues the asynchronous
/// start; the source delivers `AudioStarted` or `AudioError` on the bus.
pub trait AudioSource: Send {
    fn start(&mut self, bus: &EventBus) -> DialResult<AudioStream>;

    /// Stop capture/playback. Idempotent.
    fn stop(&mut self);
}

/// Reads audio from a file instead of the microphone.
pub struct FileAudioSource {
    path: PathBuf,
}

impl FileAudioSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioSource for FileAudioSource {
    fn start(&mut self, bus: &EventBus) -> DialResult<AudioStream> {
        if !self.path.exists() {
            return Err(DialError::Audio(format!(
                "audio file not found: {}",
                self.path.display()
            )));
        }
        info!("reading audio from {}", self.path.display());
        bus.send(EngineEvent::AudioStarted).ok();
        Ok(AudioStream::File(self.path.clone()))
    }

    fn stop(&mut self) {}
}

/// Live microphone capture via cpal.
pub struct MicrophoneSource {
    sample_rate: u32,
    stop_tx: Option<Sender<()>>,
}

impl MicrophoneSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            stop_tx: None,
        }
    }
}

impl AudioSource for MicrophoneSource {
    fn start(&mut self, bus: &EventBus) -> DialResult<AudioStream> {
        let (sample_tx, sample_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let bus = bus.clone();
        let sample_rate = self.sample_rate;

        thread::spawn(move || capture_thread(sample_rate, sample_tx, stop_rx, bus));
        self.stop_tx = Some(stop_tx);
        Ok(AudioStream::Live(sample_rx))
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            tx.send(()).ok();
            debug!("microphone stop requested");
        }
    }
}

/// Owns the cpal stream for its whole lifetime; the stream is dropped
/// (and capture ends) when the stop channel fires or the source is gone.
fn capture_thread(
    sample_rate: u32,
    sample_tx: Sender<Vec<i16>>,
    stop_rx: Receiver<()>,
    bus: EventBus,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        bus.send(EngineEvent::AudioError("no default input device".to_string()))
            .ok();
        return;
    };

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!("capturing from {device_name} at {sample_rate} Hz");

    let config = cpal::StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_bus = bus.clone();
    let stream = device.build_input_stream(
        &config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            if sample_tx.send(data.to_vec()).is_err() {
                warn!("audio receiver dropped");
            }
        },
        move |err| {
            err_bus
                .send(EngineEvent::AudioError(err.to_string()))
                .ok();
        },
        None,
    );

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            bus.send(EngineEvent::AudioError(format!("cannot open input stream: {e}")))
                .ok();
            return;
        }
    };

    if let Err(e) = stream.play() {
        bus.send(EngineEvent::AudioError(format!("cannot start capture: {e}")))
            .ok();
        return;
    }

    bus.send(EngineEvent::AudioStarted).ok();

    // park until stopped; dropping the stream ends capture
    let _ = stop_rx.recv();
    debug!("capture thread stopped");
}
