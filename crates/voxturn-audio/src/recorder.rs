use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::frame_source::FrameSource;
use voxturn_foundation::AudioError;
use voxturn_vad::{EndpointDetector, SpeechState, VadError};

/// Pre-roll ring depth: frames kept from before a confirmed onset so
/// the utterance does not clip onset consonants (~320ms at 32ms frames).
pub const PRE_ROLL_FRAMES: usize = 10;

/// Length of the zero-filled placeholder returned when no speech was
/// detected, so callers never see an empty sample buffer.
const NO_SPEECH_PLACEHOLDER_MS: u64 = 100;

/// Maximum recording duration before auto-stop.
const MAX_RECORDING_DURATION: Duration = Duration::from_secs(30);

/// Silence duration with no speech onset before giving up.
const SILENCE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Minimum utterance duration; anything shorter is treated as noise.
const MIN_SPEECH_DURATION: Duration = Duration::from_millis(300);

#[derive(Error, Debug)]
pub enum RecordError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Vad(#[from] VadError),
}

/// One bounded utterance returned by the recorder.
///
/// Immutable once returned; ownership transfers to the caller.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub had_speech: bool,
}

impl Utterance {
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    fn no_speech(sample_rate: u32) -> Self {
        let placeholder = (sample_rate as u64 * NO_SPEECH_PLACEHOLDER_MS / 1000) as usize;
        Self {
            samples: vec![0.0; placeholder],
            sample_rate,
            had_speech: false,
        }
    }
}

/// Timing ceilings for one `record_utterance` call.
///
/// Hitting a ceiling is data, not an error: the silence timeout yields
/// a no-speech utterance, the max-duration ceiling yields whatever was
/// captured so far.
#[derive(Debug, Clone)]
pub struct RecordConfig {
    pub max_duration: Duration,
    pub silence_timeout: Duration,
    pub min_duration: Duration,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            max_duration: MAX_RECORDING_DURATION,
            silence_timeout: SILENCE_TIMEOUT,
            min_duration: MIN_SPEECH_DURATION,
        }
    }
}

/// Optional per-call observers for endpoint edges.
#[derive(Default)]
pub struct RecordHooks<'a> {
    pub on_speech_start: Option<&'a mut dyn FnMut()>,
    pub on_speech_end: Option<&'a mut dyn FnMut()>,
}

/// Clonable stop signal for a recorder; safe to use from any thread.
#[derive(Clone)]
pub struct RecorderHandle {
    stop: Arc<AtomicBool>,
}

impl RecorderHandle {
    /// Request that the in-flight `record_utterance` return promptly
    /// with its partial buffer. Idempotent; not an error when idle.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Turns a live frame source plus an endpoint detector into bounded
/// utterances with pre-roll padding.
pub struct Recorder {
    source: Box<dyn FrameSource>,
    detector: EndpointDetector,
    stop: Arc<AtomicBool>,
}

impl Recorder {
    /// The source must deliver frames at exactly the detector's
    /// configured rate and size; mismatches fail fast here rather than
    /// being coerced per frame.
    pub fn new(source: Box<dyn FrameSource>, detector: EndpointDetector) -> Result<Self, VadError> {
        let config = detector.config();
        if source.sample_rate() != config.sample_rate_hz {
            return Err(VadError::SampleRateMismatch {
                required: config.sample_rate_hz,
                configured: source.sample_rate(),
            });
        }
        if source.frame_size() != config.frame_size_samples {
            return Err(VadError::FrameLengthMismatch {
                expected: config.frame_size_samples,
                got: source.frame_size(),
            });
        }
        Ok(Self {
            source,
            detector,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn handle(&self) -> RecorderHandle {
        RecorderHandle {
            stop: self.stop.clone(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    /// Record a single utterance with automatic endpoint detection.
    ///
    /// Blocks the calling thread until a speech end is confirmed, a
    /// ceiling in `config` is hit, or `RecorderHandle::stop` is called.
    /// Utterances shorter than `min_duration` are discarded as noise
    /// and capture resumes with a re-armed detector.
    pub fn record_utterance(
        &mut self,
        config: &RecordConfig,
        mut hooks: RecordHooks<'_>,
    ) -> Result<Utterance, RecordError> {
        self.stop.store(false, Ordering::SeqCst);
        self.detector.reset();

        let frame_size = self.source.frame_size();
        let sample_rate = self.source.sample_rate();
        let frame_duration =
            Duration::from_secs_f64(frame_size as f64 / sample_rate as f64);
        let poll = frame_duration * 2;

        // Trailing silence appended while the detector was still in
        // Speaking: one frame per silence pad frame except the last,
        // which arrives as SpeechEnding and is never appended.
        let trailing_pad_samples =
            (self.detector.config().silence_pad_frames as usize).saturating_sub(1) * frame_size;

        let started_at = Instant::now();
        let mut listen_deadline = started_at + config.silence_timeout;
        let mut pre_roll: VecDeque<Vec<f32>> = VecDeque::with_capacity(PRE_ROLL_FRAMES);
        let mut samples: Vec<f32> = Vec::new();
        let mut speech_started = false;
        let mut speech_ended = false;

        debug!(?config, "recording utterance");

        while !speech_ended {
            if self.stop.load(Ordering::SeqCst) {
                debug!("recording stopped by request");
                break;
            }
            if started_at.elapsed() >= config.max_duration {
                info!("max recording duration reached, force-stopping");
                break;
            }
            if !speech_started && Instant::now() >= listen_deadline {
                debug!("silence timeout with no speech onset");
                return Ok(Utterance::no_speech(sample_rate));
            }

            let Some(frame) = self.source.next_frame(poll)? else {
                continue;
            };
            let result = self.detector.process(&frame)?;

            match result.state {
                SpeechState::SpeechStarting => {
                    speech_started = true;
                    if let Some(cb) = hooks.on_speech_start.as_mut() {
                        cb();
                    }
                    // Commit the pre-roll as the utterance head so the
                    // onset consonants survive.
                    for buffered in pre_roll.drain(..) {
                        samples.extend_from_slice(&buffered);
                    }
                    samples.extend_from_slice(&frame);
                }
                SpeechState::Speaking => {
                    if speech_started {
                        samples.extend_from_slice(&frame);
                    }
                }
                SpeechState::SpeechEnding => {
                    if let Some(cb) = hooks.on_speech_end.as_mut() {
                        cb();
                    }
                    samples.truncate(samples.len().saturating_sub(trailing_pad_samples));

                    let duration = samples.len() as f32 / sample_rate as f32;
                    if duration < config.min_duration.as_secs_f32() {
                        warn!(
                            duration_seconds = duration,
                            "utterance below min duration, discarding and resuming"
                        );
                        samples.clear();
                        speech_started = false;
                        self.detector.reset();
                        listen_deadline = Instant::now() + config.silence_timeout;
                        continue;
                    }
                    speech_ended = true;
                }
                SpeechState::Silence => {
                    if pre_roll.len() == PRE_ROLL_FRAMES {
                        pre_roll.pop_front();
                    }
                    pre_roll.push_back(frame);
                }
            }
        }

        if samples.is_empty() {
            return Ok(Utterance::no_speech(sample_rate));
        }

        let duration = samples.len() as f32 / sample_rate as f32;
        let had_speech = speech_started && duration >= config.min_duration.as_secs_f32();
        info!(
            duration_seconds = duration,
            had_speech, "utterance captured"
        );
        Ok(Utterance {
            samples,
            sample_rate,
            had_speech,
        })
    }

    /// Capture exactly `duration` of audio, bypassing the detector.
    /// Used for calibration and testing, not conversational turns.
    pub fn record_fixed_duration(&mut self, duration: Duration) -> Result<Utterance, RecordError> {
        self.stop.store(false, Ordering::SeqCst);

        let frame_size = self.source.frame_size();
        let sample_rate = self.source.sample_rate();
        let target = (duration.as_secs_f64() * sample_rate as f64) as usize;
        let poll = Duration::from_secs_f64(frame_size as f64 / sample_rate as f64) * 2;
        // Grace beyond the nominal duration for driver latency.
        let deadline = Instant::now() + duration + Duration::from_secs(2);

        let mut samples = Vec::with_capacity(target);
        while samples.len() < target {
            if self.stop.load(Ordering::SeqCst) || Instant::now() >= deadline {
                break;
            }
            if let Some(frame) = self.source.next_frame(poll)? {
                samples.extend_from_slice(&frame);
            }
        }
        samples.truncate(target);

        Ok(Utterance {
            samples,
            sample_rate,
            had_speech: true,
        })
    }
}
