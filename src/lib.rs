//! Voxdial Library
//!
//! Core modules for the voxdial voice dialing engine.

pub mod actions;
pub mod audio;
pub mod config;
pub mod contacts;
pub mod engine;
pub mod error;
pub mod events;
pub mod grammar;
pub mod interpret;
pub mod logger;
pub mod normalize;
pub mod srec;
