//! External collaborator contracts consumed by the orchestrator.
//!
//! Transcription, reply generation, and speech synthesis are all
//! blocking calls owned by the caller; the orchestrator sequences them
//! but never retries or times them out. Collaborators enforce their
//! own timeouts.

use anyhow::Result;

/// Audio returned by a [`Synthesizer`].
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Speech-to-text collaborator.
pub trait Transcriber: Send {
    /// Transcribe a complete utterance. May return an empty string when
    /// nothing intelligible was said.
    fn transcribe(&mut self, samples: &[f32], sample_rate: u32) -> Result<String>;
}

/// Reply-generation collaborator. Conversation history, if any, lives
/// entirely inside the implementation.
pub trait ReplyGenerator: Send {
    fn respond(&mut self, user_text: &str) -> Result<String>;
}

/// Text-to-speech collaborator.
pub trait Synthesizer: Send {
    fn synthesize(&mut self, reply_text: &str) -> Result<SynthesizedAudio>;
}
