use serde::{Deserialize, Serialize};

/// Current state of speech detection.
///
/// `SpeechStarting` and `SpeechEnding` are edge-triggered: the detector
/// reports them for exactly one `process()` call, then settles into
/// `Speaking` or `Silence` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechState {
    Silence,
    SpeechStarting,
    Speaking,
    SpeechEnding,
}

impl Default for SpeechState {
    fn default() -> Self {
        Self::Silence
    }
}

/// Result from processing one audio frame through the detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadFrameResult {
    /// Speech probability reported by the classifier, in [0, 1].
    pub probability: f32,
    /// Whether the probability cleared the configured threshold.
    pub is_speech: bool,
    /// Endpoint state after accounting for pad-frame hysteresis.
    pub state: SpeechState,
}

#[derive(Debug, Clone, Default)]
pub struct VadMetrics {
    pub frames_processed: u64,

    pub speech_segments: u64,

    pub speech_frames: u64,

    pub silence_frames: u64,

    pub last_probability: f32,
}
