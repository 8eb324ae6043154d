use thiserror::Error;

use voxturn_audio::RecordError;
use voxturn_foundation::AudioError;
use voxturn_vad::VadError;

use crate::types::TurnState;

/// Failures that abort a conversation turn. The orchestrator returns
/// to `Idle` before surfacing any of these; it never retries.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Vad(#[from] VadError),

    #[error("{stage} collaborator failed: {source}")]
    Collaborator {
        stage: TurnState,
        #[source]
        source: anyhow::Error,
    },
}

impl From<RecordError> for TurnError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Audio(e) => TurnError::Audio(e),
            RecordError::Vad(e) => TurnError::Vad(e),
        }
    }
}
