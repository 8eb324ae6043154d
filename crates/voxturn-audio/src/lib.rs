//! Audio capture and playback for VoxTurn.
//!
//! Capture runs on a dedicated thread owning the cpal input stream; the
//! stream callback only forwards converted samples into a bounded
//! channel, and the [`Recorder`] pulls fixed-size frames from it on the
//! control thread. Playback mirrors this: the [`Player`] writes ~32 ms
//! chunks through an [`AudioSink`], checking its cancel flag between
//! chunks so `stop()` takes effect within one chunk.

pub mod capture;
pub mod device;
pub mod frame_source;
pub mod player;
pub mod recorder;

pub use capture::{CaptureStats, CaptureThread};
pub use frame_source::{ChannelFrameSource, FrameSource};
pub use player::{AudioSink, CpalSink, Player, PlayerHandle, SinkStream};
pub use recorder::{
    RecordConfig, RecordError, RecordHooks, Recorder, RecorderHandle, Utterance,
};
