use serde::{Deserialize, Serialize};

use super::constants::{
    FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ, SILENCE_PAD_FRAMES, SPEECH_PAD_FRAMES, SPEECH_THRESHOLD,
};

/// Endpoint detector configuration.
///
/// The pad-frame hysteresis, not the raw per-frame probability, decides
/// endpoints: a start is confirmed only after `speech_pad_frames`
/// consecutive above-threshold frames, an end only after
/// `silence_pad_frames` consecutive below-threshold frames. The
/// asymmetry avoids false triggers on short noise bursts without
/// clipping trailing phonemes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// Speech probability threshold (0.0-1.0).
    pub threshold: f32,

    /// Consecutive speech frames to confirm speech start.
    pub speech_pad_frames: u32,

    /// Consecutive silence frames to confirm speech end.
    pub silence_pad_frames: u32,

    pub frame_size_samples: usize,

    pub sample_rate_hz: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: SPEECH_THRESHOLD,
            speech_pad_frames: SPEECH_PAD_FRAMES,
            silence_pad_frames: SILENCE_PAD_FRAMES,
            frame_size_samples: FRAME_SIZE_SAMPLES,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

impl VadConfig {
    pub fn frame_duration_ms(&self) -> f32 {
        (self.frame_size_samples as f32 * 1000.0) / self.sample_rate_hz as f32
    }

    /// Latency added before a speech start is confirmed.
    pub fn speech_pad_ms(&self) -> f32 {
        self.speech_pad_frames as f32 * self.frame_duration_ms()
    }

    /// Silence required before a speech end is confirmed.
    pub fn silence_pad_ms(&self) -> f32 {
        self.silence_pad_frames as f32 * self.frame_duration_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pads_match_constants() {
        let config = VadConfig::default();
        assert_eq!(config.speech_pad_frames, 3);
        assert_eq!(config.silence_pad_frames, 10);
        assert_eq!(config.threshold, 0.5);
    }

    #[test]
    fn frame_duration_at_16khz() {
        let config = VadConfig::default();
        assert!((config.frame_duration_ms() - 32.0).abs() < 0.01);
        assert!((config.silence_pad_ms() - 320.0).abs() < 0.1);
    }
}
