use serde::{Deserialize, Serialize};

/// Stage of a conversation turn. `Idle` is both the initial state and
/// the state every turn returns to, completed or cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Listening,
    Transcribing,
    Thinking,
    Speaking,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TurnState::Idle => "idle",
            TurnState::Listening => "listening",
            TurnState::Transcribing => "transcribing",
            TurnState::Thinking => "thinking",
            TurnState::Speaking => "speaking",
        };
        write!(f, "{}", s)
    }
}

/// Result of one `process_turn` call. A turn that short-circuits (no
/// speech, empty transcription, or a stop request) carries empty
/// strings for the stages it never reached.
#[derive(Debug, Clone, Default)]
pub struct TurnOutcome {
    pub user_text: String,
    pub reply_text: String,
    /// State at the time the turn returned; always `Idle`.
    pub state: TurnState,
}

/// The single registered state-change observer. Invoked synchronously
/// on the control thread at every transition; there is no event queue
/// and missed notifications are not replayed.
pub type StateCallback = Box<dyn FnMut(TurnState) + Send>;
