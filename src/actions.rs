//! Recognition hypotheses and the actions derived from them
//!
//! An [`ActionDescriptor`] is the engine's output unit: one candidate
//! user-facing action with a spoken label consumed by downstream UI/TTS
//! layers.

use crate::contacts::PhoneId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate recognition result from the recognizer's n-best list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub confidence: f32,
    /// Display transcription of what was heard.
    pub literal: String,
    /// Whitespace-separated semantic token string, e.g. `CALL 10 11 12 13 14 15`.
    pub semantic: String,
}

impl Hypothesis {
    pub fn new(confidence: f32, literal: impl Into<String>, semantic: impl Into<String>) -> Self {
        Self {
            confidence,
            literal: literal.into(),
            semantic: semantic.into(),
        }
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conf={} lit={} sem={}",
            self.confidence, self.literal, self.semantic
        )
    }
}

/// What a call action dials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// A literal number, formatted for display.
    RawNumber(String),
    /// A row in the phone table.
    Phone(PhoneId),
    /// A row in the person table (no specific phone resolved).
    Person(PhoneId),
    Voicemail,
}

/// An opaque reference to a named intent-like action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRef {
    pub reference: String,
    /// The sentence that triggered the action, for downstream TTS.
    pub spoken_sentence: Option<String>,
}

impl IntentRef {
    /// Parse an opaque action reference. The reference must carry a
    /// URI-style scheme; anything else is malformed.
    pub fn parse(token: &str) -> Option<Self> {
        let (scheme, rest) = token.split_once(':')?;
        if scheme.is_empty() || rest.is_empty() {
            return None;
        }
        let valid = scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid {
            return None;
        }
        Some(Self {
            reference: token.to_string(),
            spoken_sentence: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Call(CallTarget),
    Intent(IntentRef),
}

/// One candidate user action derived from a hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    /// Human-readable label, also the "spoken sentence" for TTS.
    pub spoken: String,
    pub exclude_from_recents: bool,
}

impl ActionDescriptor {
    pub fn call(target: CallTarget, spoken: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Call(target),
            spoken: spoken.into(),
            exclude_from_recents: false,
        }
    }

    pub fn intent(reference: IntentRef, spoken: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::Intent(reference),
            spoken: spoken.into(),
            exclude_from_recents: false,
        }
    }

    pub fn exclude_from_recents(mut self) -> Self {
        self.exclude_from_recents = true;
        self
    }

    /// Two actions are duplicates when kind and resolved target agree;
    /// labels and auxiliary fields are ignored.
    pub fn same_target(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (ActionKind::Call(a), ActionKind::Call(b)) => a == b,
            (ActionKind::Intent(a), ActionKind::Intent(b)) => a.reference == b.reference,
            _ => false,
        }
    }
}

impl fmt::Display for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::Call(CallTarget::RawNumber(n)) => write!(f, "call number {n}")?,
            ActionKind::Call(CallTarget::Phone(id)) => write!(f, "call phone id {id}")?,
            ActionKind::Call(CallTarget::Person(id)) => write!(f, "call person id {id}")?,
            ActionKind::Call(CallTarget::Voicemail) => write!(f, "call voicemail")?,
            ActionKind::Intent(r) => write!(f, "intent {}", r.reference)?,
        }
        write!(f, " spoken={:?}", self.spoken)?;
        if self.exclude_from_recents {
            write!(f, " exclude_from_recents")?;
        }
        Ok(())
    }
}
