use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the audio device layer (capture and playback).
///
/// Device errors are turn-fatal: the orchestrator aborts the current
/// turn and surfaces them unchanged rather than retrying.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Audio stream closed")]
    StreamClosed,

    #[error("Device enumeration error: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("CPAL error: {0}")]
    Cpal(#[from] cpal::StreamError),

    #[error("Build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

/// Device-level audio configuration for the capture stream.
///
/// The stream is opened at exactly this rate; there is no hidden
/// resampling between the device and the classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate_hz: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            channels: 1,
        }
    }
}
