//! Turn sequencing: Listening -> Transcribing -> Thinking -> Speaking.
//!
//! One logical turn runs on a single control thread. The recorder and
//! player each own their dedicated audio threads, so a `stop()` issued
//! from another thread (UI, signal handler) interrupts them without
//! waiting for the control loop to poll. Collaborator calls are not
//! cancellable mid-call; a stop during Transcribing or Thinking takes
//! effect once that call returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use voxturn_audio::{Player, PlayerHandle, RecordConfig, RecordHooks, Recorder, RecorderHandle};

use crate::collaborators::{ReplyGenerator, Synthesizer, Transcriber};
use crate::error::TurnError;
use crate::types::{StateCallback, TurnOutcome, TurnState};

/// Cross-thread stop control for a running orchestrator.
///
/// `stop()` reaches whichever sub-component is currently blocking and
/// forces the turn back to `Idle` once the active call returns.
#[derive(Clone)]
pub struct OrchestratorHandle {
    stop: Arc<AtomicBool>,
    recorder: RecorderHandle,
    player: PlayerHandle,
}

impl OrchestratorHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.recorder.stop();
        self.player.stop();
    }
}

/// Drives complete conversation turns over a recorder, a player, and
/// the three external collaborators.
pub struct TurnOrchestrator {
    recorder: Recorder,
    player: Player,
    transcriber: Box<dyn Transcriber>,
    replier: Box<dyn ReplyGenerator>,
    synthesizer: Box<dyn Synthesizer>,
    record_config: RecordConfig,
    on_state: Option<StateCallback>,
    stop: Arc<AtomicBool>,
    state: TurnState,
}

impl TurnOrchestrator {
    pub fn new(
        recorder: Recorder,
        player: Player,
        transcriber: Box<dyn Transcriber>,
        replier: Box<dyn ReplyGenerator>,
        synthesizer: Box<dyn Synthesizer>,
        record_config: RecordConfig,
    ) -> Self {
        Self {
            recorder,
            player,
            transcriber,
            replier,
            synthesizer,
            record_config,
            on_state: None,
            stop: Arc::new(AtomicBool::new(false)),
            state: TurnState::Idle,
        }
    }

    /// Register the single state-change observer. Each transition
    /// invokes it synchronously with the new state; registering again
    /// replaces the previous observer.
    pub fn on_state_change(&mut self, callback: impl FnMut(TurnState) + Send + 'static) {
        self.on_state = Some(Box::new(callback));
    }

    pub fn handle(&self) -> OrchestratorHandle {
        OrchestratorHandle {
            stop: self.stop.clone(),
            recorder: self.recorder.handle(),
            player: self.player.handle(),
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Run one full listen-transcribe-respond-speak cycle.
    ///
    /// Returns to `Idle` on every path, including errors and stop
    /// requests. An utterance with no speech ends the turn immediately
    /// with an empty outcome and zero collaborator calls.
    pub fn process_turn(&mut self) -> Result<TurnOutcome, TurnError> {
        self.stop.store(false, Ordering::SeqCst);

        let result = self.run_turn();
        if self.state != TurnState::Idle {
            if result.is_err() {
                warn!(from = %self.state, "turn aborted, returning to idle");
            }
            self.set_state(TurnState::Idle);
        }
        result.map(|mut outcome| {
            outcome.state = self.state;
            outcome
        })
    }

    fn run_turn(&mut self) -> Result<TurnOutcome, TurnError> {
        self.set_state(TurnState::Listening);
        let utterance = self
            .recorder
            .record_utterance(&self.record_config, RecordHooks::default())?;

        if self.stop_requested() {
            debug!("stopped while listening");
            return Ok(TurnOutcome::default());
        }
        if !utterance.had_speech {
            debug!("no speech in utterance, skipping turn");
            return Ok(TurnOutcome::default());
        }

        self.set_state(TurnState::Transcribing);
        let user_text = self
            .transcriber
            .transcribe(&utterance.samples, utterance.sample_rate)
            .map_err(|source| TurnError::Collaborator {
                stage: TurnState::Transcribing,
                source,
            })?;
        info!(text = %user_text, "transcribed");

        if self.stop_requested() {
            return Ok(TurnOutcome {
                user_text,
                ..TurnOutcome::default()
            });
        }
        if user_text.trim().is_empty() {
            debug!("empty transcription, skipping reply");
            return Ok(TurnOutcome {
                user_text,
                ..TurnOutcome::default()
            });
        }

        self.set_state(TurnState::Thinking);
        let reply_text = self
            .replier
            .respond(&user_text)
            .map_err(|source| TurnError::Collaborator {
                stage: TurnState::Thinking,
                source,
            })?;
        info!(text = %reply_text, "reply generated");

        if self.stop_requested() {
            return Ok(TurnOutcome {
                user_text,
                reply_text,
                ..TurnOutcome::default()
            });
        }

        self.set_state(TurnState::Speaking);
        let audio = self
            .synthesizer
            .synthesize(&reply_text)
            .map_err(|source| TurnError::Collaborator {
                stage: TurnState::Speaking,
                source,
            })?;
        self.player.play(audio.samples, audio.sample_rate, true)?;

        Ok(TurnOutcome {
            user_text,
            reply_text,
            state: TurnState::Idle,
        })
    }

    /// Run turns until an exit phrase is heard, `max_turns` complete,
    /// or `stop()` is called. Exit phrases are matched case-insensitively
    /// as substrings of the transcribed text; a matching turn still
    /// finishes its Speaking stage before the loop ends.
    ///
    /// Returns the number of turns completed.
    pub fn run_conversation_loop(
        &mut self,
        max_turns: Option<usize>,
        exit_phrases: &[String],
    ) -> Result<usize, TurnError> {
        let mut turns = 0usize;
        loop {
            if self.stop.load(Ordering::SeqCst) {
                info!(turns, "conversation stopped");
                break;
            }
            if let Some(max) = max_turns {
                if turns >= max {
                    info!(turns, "conversation reached max turns");
                    break;
                }
            }

            let outcome = self.process_turn()?;
            turns += 1;

            let heard = outcome.user_text.to_lowercase();
            if exit_phrases
                .iter()
                .filter(|p| !p.is_empty())
                .any(|p| heard.contains(&p.to_lowercase()))
            {
                info!(turns, "exit phrase heard, ending conversation");
                break;
            }
        }
        Ok(turns)
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn set_state(&mut self, state: TurnState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "turn state");
        self.state = state;
        if let Some(callback) = self.on_state.as_mut() {
            callback(state);
        }
    }
}
