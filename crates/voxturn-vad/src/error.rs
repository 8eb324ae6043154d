use thiserror::Error;

/// Errors from the endpoint detector and its classifier.
///
/// A wrong frame length is a contract violation and fails fast; the
/// detector never downsamples or pads invisibly.
#[derive(Error, Debug)]
pub enum VadError {
    #[error("frame length mismatch: expected {expected} samples, got {got}")]
    FrameLengthMismatch { expected: usize, got: usize },

    #[error("classifier requires {required} Hz, detector configured for {configured} Hz")]
    SampleRateMismatch { required: u32, configured: u32 },

    #[error("classifier error: {0}")]
    Classifier(String),
}
