//! Shared foundation types for the VoxTurn voice turn-taking engine.
//!
//! This crate holds the audio error taxonomy and the device-level audio
//! configuration used by the capture and playback layers. Higher layers
//! (VAD, recorder, orchestrator) build their own error types on top.

pub mod error;

pub use error::{AudioConfig, AudioError};
