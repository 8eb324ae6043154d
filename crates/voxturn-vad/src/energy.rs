//! RMS-energy speech classifier.
//!
//! Maps frame energy in dBFS onto a pseudo-probability so the energy
//! backend satisfies the same `SpeechClassifier` contract as a neural
//! model. Stateless across frames; `reset()` is a no-op.

use crate::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use crate::{SpeechClassifier, VadError};

const EPSILON: f32 = 1e-10;

/// Energy below this maps to probability 0.0.
const DEFAULT_FLOOR_DBFS: f32 = -60.0;

/// Energy above this maps to probability 1.0.
const DEFAULT_CEILING_DBFS: f32 = -20.0;

pub struct EnergyClassifier {
    floor_dbfs: f32,
    ceiling_dbfs: f32,
    sample_rate_hz: u32,
    frame_size_samples: usize,
}

impl EnergyClassifier {
    pub fn new() -> Self {
        Self {
            floor_dbfs: DEFAULT_FLOOR_DBFS,
            ceiling_dbfs: DEFAULT_CEILING_DBFS,
            sample_rate_hz: SAMPLE_RATE_HZ,
            frame_size_samples: FRAME_SIZE_SAMPLES,
        }
    }

    pub fn with_range(mut self, floor_dbfs: f32, ceiling_dbfs: f32) -> Self {
        self.floor_dbfs = floor_dbfs;
        self.ceiling_dbfs = ceiling_dbfs;
        self
    }

    pub fn calculate_rms(frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_squares / frame.len() as f64).sqrt() as f32
    }

    pub fn calculate_dbfs(frame: &[f32]) -> f32 {
        let rms = Self::calculate_rms(frame);
        if rms <= EPSILON {
            return -100.0;
        }
        20.0 * rms.log10()
    }
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechClassifier for EnergyClassifier {
    fn predict(&mut self, frame: &[f32]) -> Result<f32, VadError> {
        let db = Self::calculate_dbfs(frame);
        let span = self.ceiling_dbfs - self.floor_dbfs;
        if span <= 0.0 {
            return Err(VadError::Classifier(format!(
                "invalid energy range: floor {} >= ceiling {}",
                self.floor_dbfs, self.ceiling_dbfs
            )));
        }
        Ok(((db - self.floor_dbfs) / span).clamp(0.0, 1.0))
    }

    fn reset(&mut self) {}

    fn required_sample_rate(&self) -> u32 {
        self.sample_rate_hz
    }

    fn required_frame_size(&self) -> usize {
        self.frame_size_samples
    }
}
