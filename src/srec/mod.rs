//! Recognizer service boundary
//!
//! The acoustic recognizer and its grammar objects are black boxes:
//! the engine issues requests and awaits completion events on the bus.
//! Backends:
//! - Scripted: replays a JSON hypothesis script (offline testing, CLI)

pub mod scripted;

use crate::error::{DialError, DialResult};
use crate::events::EventBus;
use crate::grammar::SlotEntry;
use std::path::Path;
use std::str::FromStr;

pub use scripted::ScriptedRecognizer;

/// Supported capture codecs. Anything else is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Pcm16Bit11K,
    Pcm16Bit8K,
}

impl Codec {
    /// Baseline acoustic parameter file inside the grammar directory.
    pub fn baseline_file(self) -> &'static str {
        match self {
            Codec::Pcm16Bit11K => "baseline11k.par",
            Codec::Pcm16Bit8K => "baseline8k.par",
        }
    }

    pub fn sample_rate(self) -> u32 {
        match self {
            Codec::Pcm16Bit11K => 11025,
            Codec::Pcm16Bit8K => 8000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Pcm16Bit11K => "PCM/16bit/11KHz",
            Codec::Pcm16Bit8K => "PCM/16bit/8KHz",
        }
    }
}

impl FromStr for Codec {
    type Err = DialError;

    fn from_str(s: &str) -> DialResult<Self> {
        if s.eq_ignore_ascii_case(Codec::Pcm16Bit11K.as_str()) {
            Ok(Codec::Pcm16Bit11K)
        } else if s.eq_ignore_ascii_case(Codec::Pcm16Bit8K.as_str()) {
            Ok(Codec::Pcm16Bit8K)
        } else {
            Err(DialError::Config(format!("illegal codec {s:?}")))
        }
    }
}

/// A grammar handle created by the recognizer. Operations are
/// asynchronous: each delivers a completion event on the bus.
pub trait Grammar: Send {
    fn load(&mut self, bus: &EventBus);
    fn reset_all_slots(&mut self, bus: &EventBus);
    fn add_item_batch(&mut self, entries: &[SlotEntry], bus: &EventBus);
    fn compile_all_slots(&mut self, bus: &EventBus);
    fn save(&mut self, path: &Path, bus: &EventBus);
    /// Release the handle. Synchronous and infallible.
    fn unload(&mut self);
}

/// The embedded recognizer service.
pub trait Recognizer: Send {
    /// Configure for a codec via its baseline parameter file. Synchronous;
    /// needed once per codec.
    fn configure(&mut self, baseline: &Path) -> DialResult<()>;

    fn reset_acoustic_state(&mut self);

    /// Create a grammar handle for a template or compiled artifact path.
    fn new_grammar(&mut self, path: &Path) -> DialResult<Box<dyn Grammar>>;

    /// Start recognizing the audio stream against the grammar. Completes
    /// with `RecognitionResult`, `RecognitionFailure`, or `RecognizerError`.
    fn recognize(&mut self, stream: &crate::audio::AudioStream, grammar: &mut dyn Grammar, bus: &EventBus);

    /// Stop any recognition in flight. Idempotent.
    fn stop(&mut self);
}
