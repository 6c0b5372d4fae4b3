//! Engine events
//!
//! Every long-running collaborator operation (audio start, grammar
//! load/reset/stuff/compile/save, recognition) completes by delivering
//! one of these events on the session's bus. The engine consumes them
//! one at a time; collaborators never call back into the engine.

use crate::actions::Hypothesis;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;

/// Clonable sender half of the engine's event channel, handed to every
/// collaborator that completes asynchronously.
pub type EventBus = UnboundedSender<EngineEvent>;

#[derive(Debug)]
pub enum EngineEvent {
    /// Audio capture or playback has begun.
    AudioStarted,
    AudioError(String),

    /// A grammar file (template or compiled artifact) finished loading.
    GrammarLoaded,
    SlotsReset,
    BatchAdded,
    /// A batch was rejected; not fatal, the next batch proceeds.
    BatchRejected { index: usize, reason: String },
    SlotsCompiled,
    GrammarSaved(PathBuf),
    GrammarError(String),

    /// The recognizer produced an n-best list.
    RecognitionResult(Vec<Hypothesis>),
    /// No usable speech (includes the no-speech timeout).
    RecognitionFailure(String),
    RecognizerError(String),

    /// Wake-up sentinel sent by [`crate::engine::CancelHandle`]; carries
    /// no state of its own, the in-progress flag is authoritative.
    Cancelled,
}
