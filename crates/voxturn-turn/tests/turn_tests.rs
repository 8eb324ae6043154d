//! End-to-end turn tests with mock collaborators, a channel-fed frame
//! source, and an in-memory playback sink. No audio hardware required.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;

use voxturn_audio::{
    AudioSink, ChannelFrameSource, Player, RecordConfig, Recorder, SinkStream,
};
use voxturn_foundation::AudioError;
use voxturn_turn::{
    OrchestratorHandle, ReplyGenerator, SynthesizedAudio, Synthesizer, Transcriber, TurnError,
    TurnOrchestrator, TurnState,
};
use voxturn_vad::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use voxturn_vad::{EndpointDetector, EnergyClassifier, VadConfig};

#[derive(Default)]
struct Counters {
    transcribe: AtomicUsize,
    respond: AtomicUsize,
    synthesize: AtomicUsize,
    samples_played: AtomicUsize,
}

struct ScriptedTranscriber {
    text: String,
    fail: bool,
    counters: Arc<Counters>,
}

impl Transcriber for ScriptedTranscriber {
    fn transcribe(&mut self, samples: &[f32], sample_rate: u32) -> anyhow::Result<String> {
        self.counters.transcribe.fetch_add(1, Ordering::SeqCst);
        assert!(!samples.is_empty(), "utterance audio must not be empty");
        assert_eq!(sample_rate, SAMPLE_RATE_HZ);
        if self.fail {
            anyhow::bail!("transcription backend unavailable");
        }
        Ok(self.text.clone())
    }
}

struct ScriptedReplier {
    text: String,
    fail: bool,
    counters: Arc<Counters>,
    // Lets a test issue stop() from inside the collaborator call.
    on_call: Option<Box<dyn FnMut() + Send>>,
}

impl ReplyGenerator for ScriptedReplier {
    fn respond(&mut self, user_text: &str) -> anyhow::Result<String> {
        self.counters.respond.fetch_add(1, Ordering::SeqCst);
        assert!(!user_text.is_empty());
        if let Some(hook) = self.on_call.as_mut() {
            hook();
        }
        if self.fail {
            anyhow::bail!("language model unavailable");
        }
        Ok(self.text.clone())
    }
}

struct ToneSynthesizer {
    counters: Arc<Counters>,
}

impl Synthesizer for ToneSynthesizer {
    fn synthesize(&mut self, reply_text: &str) -> anyhow::Result<SynthesizedAudio> {
        self.counters.synthesize.fetch_add(1, Ordering::SeqCst);
        assert!(!reply_text.is_empty());
        Ok(SynthesizedAudio {
            samples: vec![0.1; FRAME_SIZE_SAMPLES],
            sample_rate: SAMPLE_RATE_HZ,
        })
    }
}

struct CountingSink {
    counters: Arc<Counters>,
}

impl AudioSink for CountingSink {
    fn open(&self, _sample_rate: u32) -> Result<Box<dyn SinkStream>, AudioError> {
        Ok(Box::new(CountingStream {
            counters: self.counters.clone(),
        }))
    }
}

struct CountingStream {
    counters: Arc<Counters>,
}

impl SinkStream for CountingStream {
    fn write(&mut self, chunk: &[f32]) -> Result<(), AudioError> {
        self.counters.samples_played.fetch_add(chunk.len(), Ordering::SeqCst);
        Ok(())
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

struct Fixture {
    orchestrator: TurnOrchestrator,
    frames: Sender<Vec<f32>>,
    counters: Arc<Counters>,
    states: Arc<Mutex<Vec<TurnState>>>,
}

fn fixture(transcriber: ScriptedTranscriber, replier: ScriptedReplier) -> Fixture {
    let counters = transcriber.counters.clone();
    let (tx, rx) = bounded(128);
    let source = ChannelFrameSource::new(rx, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ);
    let detector = EndpointDetector::new(
        Box::new(EnergyClassifier::new()),
        VadConfig::default(),
    )
    .unwrap();
    let recorder = Recorder::new(Box::new(source), detector).unwrap();
    let player = Player::new(Arc::new(CountingSink {
        counters: counters.clone(),
    }));
    let synthesizer = ToneSynthesizer {
        counters: counters.clone(),
    };

    let config = RecordConfig {
        max_duration: Duration::from_secs(10),
        silence_timeout: Duration::from_millis(300),
        min_duration: Duration::from_millis(100),
    };
    let mut orchestrator = TurnOrchestrator::new(
        recorder,
        player,
        Box::new(transcriber),
        Box::new(replier),
        Box::new(synthesizer),
        config,
    );

    let states = Arc::new(Mutex::new(Vec::new()));
    let observed = states.clone();
    orchestrator.on_state_change(move |state| observed.lock().push(state));

    Fixture {
        orchestrator,
        frames: tx,
        counters,
        states,
    }
}

fn default_fixture(transcript: &str) -> Fixture {
    let counters = Arc::new(Counters::default());
    fixture(
        ScriptedTranscriber {
            text: transcript.to_string(),
            fail: false,
            counters: counters.clone(),
        },
        ScriptedReplier {
            text: "hello to you too".to_string(),
            fail: false,
            counters,
            on_call: None,
        },
    )
}

fn push_utterance(tx: &Sender<Vec<f32>>) {
    for _ in 0..10 {
        tx.send(vec![0.5; FRAME_SIZE_SAMPLES]).unwrap();
    }
    for _ in 0..10 {
        tx.send(vec![0.0; FRAME_SIZE_SAMPLES]).unwrap();
    }
}

#[test]
fn silent_turn_makes_no_collaborator_calls() {
    let mut f = default_fixture("hello");
    // Nothing fed: the recorder times out with a no-speech utterance.

    let outcome = f.orchestrator.process_turn().unwrap();

    assert!(outcome.user_text.is_empty());
    assert!(outcome.reply_text.is_empty());
    assert_eq!(outcome.state, TurnState::Idle);
    assert_eq!(f.counters.transcribe.load(Ordering::SeqCst), 0);
    assert_eq!(f.counters.respond.load(Ordering::SeqCst), 0);
    assert_eq!(f.counters.synthesize.load(Ordering::SeqCst), 0);
    assert_eq!(
        *f.states.lock(),
        vec![TurnState::Listening, TurnState::Idle]
    );
}

#[test]
fn full_turn_walks_every_state_in_order() {
    let mut f = default_fixture("hello there");
    push_utterance(&f.frames);

    let outcome = f.orchestrator.process_turn().unwrap();

    assert_eq!(outcome.user_text, "hello there");
    assert_eq!(outcome.reply_text, "hello to you too");
    assert_eq!(outcome.state, TurnState::Idle);
    assert_eq!(
        *f.states.lock(),
        vec![
            TurnState::Listening,
            TurnState::Transcribing,
            TurnState::Thinking,
            TurnState::Speaking,
            TurnState::Idle,
        ]
    );
    assert_eq!(f.counters.samples_played.load(Ordering::SeqCst), FRAME_SIZE_SAMPLES);
    assert_eq!(f.orchestrator.state(), TurnState::Idle);
}

#[test]
fn empty_transcription_skips_reply_and_synthesis() {
    let mut f = default_fixture("   ");
    push_utterance(&f.frames);

    let outcome = f.orchestrator.process_turn().unwrap();

    assert_eq!(outcome.user_text, "   ");
    assert!(outcome.reply_text.is_empty());
    assert_eq!(f.counters.transcribe.load(Ordering::SeqCst), 1);
    assert_eq!(f.counters.respond.load(Ordering::SeqCst), 0);
    assert_eq!(f.counters.synthesize.load(Ordering::SeqCst), 0);
    assert_eq!(
        *f.states.lock(),
        vec![
            TurnState::Listening,
            TurnState::Transcribing,
            TurnState::Idle
        ]
    );
}

#[test]
fn collaborator_failure_aborts_turn_back_to_idle() {
    let counters = Arc::new(Counters::default());
    let mut f = fixture(
        ScriptedTranscriber {
            text: "hello".to_string(),
            fail: false,
            counters: counters.clone(),
        },
        ScriptedReplier {
            text: String::new(),
            fail: true,
            counters,
            on_call: None,
        },
    );
    push_utterance(&f.frames);

    let err = f.orchestrator.process_turn().unwrap_err();

    match err {
        TurnError::Collaborator { stage, .. } => assert_eq!(stage, TurnState::Thinking),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(f.orchestrator.state(), TurnState::Idle);
    assert_eq!(f.states.lock().last(), Some(&TurnState::Idle));
    assert_eq!(f.counters.synthesize.load(Ordering::SeqCst), 0);
    assert_eq!(f.counters.samples_played.load(Ordering::SeqCst), 0);
}

#[test]
fn exit_phrase_ends_loop_after_speaking_completes() {
    let mut f = default_fixture("okay BYE now");
    push_utterance(&f.frames);
    // A second utterance is queued; the loop must not consume it.
    push_utterance(&f.frames);

    let turns = f
        .orchestrator
        .run_conversation_loop(Some(5), &["bye".to_string()])
        .unwrap();

    assert_eq!(turns, 1);
    // The exit turn still spoke its reply before the loop ended.
    assert_eq!(f.counters.synthesize.load(Ordering::SeqCst), 1);
    assert_eq!(f.counters.samples_played.load(Ordering::SeqCst), FRAME_SIZE_SAMPLES);
    assert_eq!(f.states.lock().last(), Some(&TurnState::Idle));
}

#[test]
fn max_turns_bounds_the_conversation_loop() {
    let mut f = default_fixture("keep going");
    push_utterance(&f.frames);
    push_utterance(&f.frames);

    let turns = f
        .orchestrator
        .run_conversation_loop(Some(2), &["bye".to_string()])
        .unwrap();

    assert_eq!(turns, 2);
    assert_eq!(f.counters.transcribe.load(Ordering::SeqCst), 2);
}

#[test]
fn stop_during_thinking_takes_effect_when_the_call_returns() {
    let counters = Arc::new(Counters::default());
    let handle_slot: Arc<Mutex<Option<OrchestratorHandle>>> = Arc::new(Mutex::new(None));
    let slot = handle_slot.clone();
    let mut f = fixture(
        ScriptedTranscriber {
            text: "question".to_string(),
            fail: false,
            counters: counters.clone(),
        },
        ScriptedReplier {
            text: "an answer".to_string(),
            fail: false,
            counters,
            on_call: Some(Box::new(move || {
                if let Some(handle) = slot.lock().as_ref() {
                    handle.stop();
                }
            })),
        },
    );
    *handle_slot.lock() = Some(f.orchestrator.handle());
    push_utterance(&f.frames);

    let outcome = f.orchestrator.process_turn().unwrap();

    // The reply call completed, but the turn ended before Speaking.
    assert_eq!(outcome.user_text, "question");
    assert_eq!(outcome.reply_text, "an answer");
    assert_eq!(f.counters.synthesize.load(Ordering::SeqCst), 0);
    assert_eq!(f.counters.samples_played.load(Ordering::SeqCst), 0);
    assert!(!f.states.lock().contains(&TurnState::Speaking));
    assert_eq!(f.orchestrator.state(), TurnState::Idle);
}
