//! Voice activity classification and endpoint detection for VoxTurn.
//!
//! The acoustic model is a black box behind [`SpeechClassifier`]; the
//! [`EndpointDetector`] wraps it with the pad-frame hysteresis state
//! machine that turns noisy per-frame probabilities into edge-triggered
//! speech-start / speech-end events.

pub mod config;
pub mod constants;
pub mod detector;
pub mod energy;
pub mod error;
pub mod types;

pub use config::VadConfig;
pub use constants::{FRAME_DURATION_MS, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use detector::EndpointDetector;
pub use energy::EnergyClassifier;
pub use error::VadError;
pub use types::{SpeechState, VadFrameResult, VadMetrics};

/// Probability-producing speech classifier consumed by the detector.
///
/// Implementations may carry internal recurrent state across calls;
/// `reset()` must clear it so utterances never leak into each other.
pub trait SpeechClassifier: Send {
    /// Return the speech probability for one frame, in [0, 1].
    fn predict(&mut self, frame: &[f32]) -> Result<f32, VadError>;

    /// Clear any internal model state.
    fn reset(&mut self);

    fn required_sample_rate(&self) -> u32;

    fn required_frame_size(&self) -> usize;
}
