use tracing::trace;

use crate::config::VadConfig;
use crate::error::VadError;
use crate::types::{SpeechState, VadFrameResult, VadMetrics};
use crate::SpeechClassifier;

/// Converts a stream of per-frame speech probabilities into discrete
/// speech-start / speech-end events using pad-frame hysteresis.
///
/// The detector owns its classifier, including any recurrent model
/// state; `reset()` clears both so no state leaks across utterances.
pub struct EndpointDetector {
    classifier: Box<dyn SpeechClassifier>,

    config: VadConfig,

    speech_frames: u32,

    silence_frames: u32,

    speaking: bool,

    metrics: VadMetrics,
}

impl EndpointDetector {
    pub fn new(classifier: Box<dyn SpeechClassifier>, config: VadConfig) -> Result<Self, VadError> {
        if classifier.required_sample_rate() != config.sample_rate_hz {
            return Err(VadError::SampleRateMismatch {
                required: classifier.required_sample_rate(),
                configured: config.sample_rate_hz,
            });
        }
        if classifier.required_frame_size() != config.frame_size_samples {
            return Err(VadError::FrameLengthMismatch {
                expected: classifier.required_frame_size(),
                got: config.frame_size_samples,
            });
        }
        Ok(Self {
            classifier,
            config,
            speech_frames: 0,
            silence_frames: 0,
            speaking: false,
            metrics: VadMetrics::default(),
        })
    }

    /// Process one frame and report probability, threshold decision, and
    /// endpoint state.
    ///
    /// `SpeechStarting` fires exactly once when `speech_pad_frames`
    /// consecutive speech frames confirm an onset; `SpeechEnding` fires
    /// exactly once when `silence_pad_frames` consecutive silence frames
    /// confirm an offset.
    pub fn process(&mut self, frame: &[f32]) -> Result<VadFrameResult, VadError> {
        let expected = self.config.frame_size_samples;
        if frame.len() != expected {
            return Err(VadError::FrameLengthMismatch {
                expected,
                got: frame.len(),
            });
        }

        let probability = self.classifier.predict(frame)?;
        let is_speech = probability >= self.config.threshold;

        if is_speech {
            self.speech_frames += 1;
            self.silence_frames = 0;
            self.metrics.speech_frames += 1;
        } else {
            self.silence_frames += 1;
            self.speech_frames = 0;
            self.metrics.silence_frames += 1;
        }

        let state = if !self.speaking {
            if self.speech_frames >= self.config.speech_pad_frames {
                self.speaking = true;
                self.metrics.speech_segments += 1;
                trace!(probability, "speech onset confirmed");
                SpeechState::SpeechStarting
            } else {
                SpeechState::Silence
            }
        } else if self.silence_frames >= self.config.silence_pad_frames {
            self.speaking = false;
            trace!(probability, "speech offset confirmed");
            SpeechState::SpeechEnding
        } else {
            SpeechState::Speaking
        };

        self.metrics.frames_processed += 1;
        self.metrics.last_probability = probability;

        Ok(VadFrameResult {
            probability,
            is_speech,
            state,
        })
    }

    /// Clear counters, the speaking flag, and the classifier's internal
    /// state, re-arming the detector for a new utterance.
    pub fn reset(&mut self) {
        self.speech_frames = 0;
        self.silence_frames = 0;
        self.speaking = false;
        self.classifier.reset();
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    pub fn metrics(&self) -> &VadMetrics {
        &self.metrics
    }
}
