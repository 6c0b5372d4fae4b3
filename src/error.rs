//! VoxDial Error Types
//!
//! Centralized error handling for the recognition engine.

use thiserror::Error;

/// Central error type for VoxDial
#[derive(Error, Debug)]
pub enum DialError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("audio source error: {0}")]
    Audio(String),

    #[error("grammar build error: {0}")]
    GrammarBuild(String),

    #[error("recognizer error: {0}")]
    Recognizer(String),

    #[error("contact source error: {0}")]
    Contacts(String),

    #[error("a recognition session is already in progress")]
    AlreadyInProgress,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias for VoxDial operations
pub type DialResult<T> = Result<T, DialError>;
