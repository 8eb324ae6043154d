use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;

use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::device;
use voxturn_foundation::AudioError;

/// Chunk granularity of the playback write loop; also the cancellation
/// latency bound, since the cancel flag is checked between chunks.
pub const PLAYBACK_CHUNK_MS: u64 = 32;

/// Samples buffered between the write loop and the output callback
/// (~250ms); `SinkStream::write` blocks when full, which is what keeps
/// the write loop at real-time pace.
const SINK_BUFFER_MS: u64 = 250;

/// Opens playback streams. The seam between the player's chunked write
/// loop and the audio backend; tests substitute a fake sink.
pub trait AudioSink: Send + Sync {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn SinkStream>, AudioError>;
}

/// One open playback stream. Lives entirely on the thread that opened
/// it; `write` blocks at roughly real-time pace.
pub trait SinkStream {
    fn write(&mut self, chunk: &[f32]) -> Result<(), AudioError>;

    /// Block until buffered audio has been played out.
    fn drain(&mut self) -> Result<(), AudioError>;
}

/// Clonable cancellation signal for in-flight playback.
#[derive(Clone)]
pub struct PlayerHandle {
    cancel: Arc<AtomicBool>,
}

impl PlayerHandle {
    /// Halt playback as close to immediately as the backend allows
    /// (within one write chunk). Idempotent if nothing is playing.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

/// Plays one audio buffer at a time to the output device.
///
/// At most one playback is live per player: starting a new one while
/// another is in flight cancels the old one first (last-writer-wins,
/// no queueing).
pub struct Player {
    sink: Arc<dyn AudioSink>,
    cancel: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), AudioError>>>,
}

impl Player {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            sink,
            cancel: Arc::new(AtomicBool::new(false)),
            playing: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    /// Player wired to the default output device.
    pub fn with_default_output() -> Self {
        Self::new(Arc::new(CpalSink::default()))
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Play `samples` at `sample_rate`.
    ///
    /// Blocking mode returns after playback completes or is cancelled;
    /// non-blocking mode starts an `audio-playback` thread and returns
    /// immediately (errors from that thread surface through `wait`).
    pub fn play(
        &mut self,
        samples: Vec<f32>,
        sample_rate: u32,
        blocking: bool,
    ) -> Result<(), AudioError> {
        self.stop();

        self.cancel.store(false, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);
        debug!(
            samples = samples.len(),
            sample_rate, blocking, "starting playback"
        );

        if blocking {
            run_playback(
                self.sink.as_ref(),
                samples,
                sample_rate,
                &self.cancel,
                &self.playing,
            )
        } else {
            let sink = self.sink.clone();
            let cancel = self.cancel.clone();
            let playing = self.playing.clone();
            let handle = thread::Builder::new()
                .name("audio-playback".to_string())
                .spawn(move || {
                    let result =
                        run_playback(sink.as_ref(), samples, sample_rate, &cancel, &playing);
                    if let Err(ref e) = result {
                        error!("playback failed: {}", e);
                    }
                    result
                })
                .map_err(|e| {
                    self.playing.store(false, Ordering::SeqCst);
                    AudioError::Fatal(format!("failed to spawn playback thread: {}", e))
                })?;
            self.thread = Some(handle);
            Ok(())
        }
    }

    /// Cancel the current playback, if any, and reclaim its thread.
    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Block until the current non-blocking playback finishes or is
    /// cancelled; returns immediately if nothing is playing.
    pub fn wait(&mut self) -> Result<(), AudioError> {
        match self.thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| AudioError::Fatal("playback thread panicked".to_string()))?,
            None => Ok(()),
        }
    }

    /// Point-in-time observation, not a guarantee; a race between
    /// "finished" and "observed" is acceptable and callers re-check.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_playback(
    sink: &dyn AudioSink,
    mut samples: Vec<f32>,
    sample_rate: u32,
    cancel: &AtomicBool,
    playing: &AtomicBool,
) -> Result<(), AudioError> {
    let chunk_size = ((sample_rate as u64 * PLAYBACK_CHUNK_MS / 1000) as usize).max(1);

    // Normalize out-of-range synthesis output instead of clipping.
    let peak = samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    if peak > 1.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }

    let result = (|| {
        let mut stream = sink.open(sample_rate)?;
        for chunk in samples.chunks(chunk_size) {
            if cancel.load(Ordering::SeqCst) {
                debug!("playback cancelled");
                return Ok(());
            }
            stream.write(chunk)?;
        }
        if !cancel.load(Ordering::SeqCst) {
            stream.drain()?;
        }
        Ok(())
    })();

    playing.store(false, Ordering::SeqCst);
    result
}

/// cpal-backed sink. The output stream is created inside `open`, on the
/// thread running the write loop, and the stream callback pulls samples
/// from a bounded channel; underruns play silence rather than blocking
/// the audio driver.
#[derive(Default)]
pub struct CpalSink {
    device_name: Option<String>,
}

impl CpalSink {
    pub fn with_device(device_name: impl Into<String>) -> Self {
        Self {
            device_name: Some(device_name.into()),
        }
    }
}

impl AudioSink for CpalSink {
    fn open(&self, sample_rate: u32) -> Result<Box<dyn SinkStream>, AudioError> {
        let device = device::output_device(self.device_name.as_deref())?;
        if let Ok(name) = device.name() {
            info!("selected output device: {}", name);
        }
        let (stream_config, sample_format) = device::negotiate_output(&device, sample_rate)?;
        let channels = stream_config.channels as usize;

        let capacity = ((sample_rate as u64 * SINK_BUFFER_MS / 1000) as usize).max(1);
        let (tx, rx) = bounded::<f32>(capacity);

        fn err_fn(err: cpal::StreamError) {
            error!("playback stream error: {}", err);
        }

        let stream = match sample_format {
            SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, channels, &rx, |s| s);
                },
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    fill_output(data, channels, &rx, |s| {
                        (s.clamp(-1.0, 1.0) * 32767.0).round() as i16
                    });
                },
                err_fn,
                None,
            )?,
            other => {
                return Err(AudioError::FormatNotSupported {
                    format: format!("{:?}", other),
                });
            }
        };
        stream.play()?;

        Ok(Box::new(CpalSinkStream {
            _stream: stream,
            tx,
        }))
    }
}

fn fill_output<T: Copy>(
    data: &mut [T],
    channels: usize,
    rx: &Receiver<f32>,
    convert: impl Fn(f32) -> T,
) {
    for frame in data.chunks_mut(channels.max(1)) {
        // Underrun degrades to silence; the callback never blocks.
        let sample = rx.try_recv().unwrap_or(0.0);
        for out in frame.iter_mut() {
            *out = convert(sample);
        }
    }
}

struct CpalSinkStream {
    _stream: cpal::Stream,
    tx: Sender<f32>,
}

impl SinkStream for CpalSinkStream {
    fn write(&mut self, chunk: &[f32]) -> Result<(), AudioError> {
        for &sample in chunk {
            // Blocks when the buffer is full, pacing the write loop.
            self.tx.send(sample).map_err(|_| AudioError::StreamClosed)?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        while !self.tx.is_empty() {
            thread::sleep(Duration::from_millis(5));
        }
        // Allow the device buffer itself to empty.
        thread::sleep(Duration::from_millis(50));
        Ok(())
    }
}
