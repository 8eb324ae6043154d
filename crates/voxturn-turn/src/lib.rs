//! Conversation turn orchestration for VoxTurn.
//!
//! Sequences each turn through Listening, Transcribing, Thinking, and
//! Speaking, wiring the recorder and player to caller-supplied
//! transcription, reply-generation, and synthesis collaborators.

pub mod collaborators;
pub mod error;
pub mod orchestrator;
pub mod types;

pub use collaborators::{ReplyGenerator, SynthesizedAudio, Synthesizer, Transcriber};
pub use error::TurnError;
pub use orchestrator::{OrchestratorHandle, TurnOrchestrator};
pub use types::{StateCallback, TurnOutcome, TurnState};
