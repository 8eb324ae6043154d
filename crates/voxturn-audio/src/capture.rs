use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::SampleFormat;

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::device;
use crate::frame_source::ChannelFrameSource;
use voxturn_foundation::{AudioConfig, AudioError};

/// Chunks buffered between the audio callback and the control thread.
const CHUNK_QUEUE_CAPACITY: usize = 64;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub chunks_captured: AtomicU64,
    pub chunks_dropped: AtomicU64,
    pub last_chunk_time: RwLock<Option<Instant>>,
}

/// Handle to the dedicated audio capture thread.
///
/// The thread owns the cpal input stream; the stream callback only
/// converts to mono f32 and `try_send`s into the bounded chunk channel.
/// It never blocks, so a stalled consumer costs dropped chunks, not a
/// wedged audio driver.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl CaptureThread {
    /// Open the input device at `config.sample_rate_hz` and start
    /// forwarding audio. Returns the thread handle plus a frame source
    /// that re-slices the chunk stream into `frame_size` frames.
    pub fn spawn(
        config: AudioConfig,
        frame_size: usize,
        device_name: Option<String>,
    ) -> Result<(Self, ChannelFrameSource), AudioError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(CaptureStats::default());
        let (chunk_tx, chunk_rx) = bounded::<Vec<f32>>(CHUNK_QUEUE_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread_shutdown = shutdown.clone();
        let thread_stats = stats.clone();
        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                run_capture(
                    config,
                    device_name,
                    chunk_tx,
                    ready_tx,
                    thread_shutdown,
                    thread_stats,
                );
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
                return Err(AudioError::Fatal(
                    "capture stream did not start within timeout".to_string(),
                ));
            }
        }

        let source = ChannelFrameSource::new(chunk_rx, frame_size, config.sample_rate_hz);
        Ok((
            Self {
                handle,
                shutdown,
                stats,
            },
            source,
        ))
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn run_capture(
    config: AudioConfig,
    device_name: Option<String>,
    chunk_tx: Sender<Vec<f32>>,
    ready_tx: Sender<Result<(), AudioError>>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
) {
    let stream = match open_stream(&config, device_name.as_deref(), chunk_tx, stats) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.into()));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(50));
    }
    drop(stream);
    info!("audio capture thread shutting down");
}

fn open_stream(
    config: &AudioConfig,
    device_name: Option<&str>,
    chunk_tx: Sender<Vec<f32>>,
    stats: Arc<CaptureStats>,
) -> Result<cpal::Stream, AudioError> {
    let device = device::input_device(device_name)?;
    if let Ok(name) = device.name() {
        info!("selected input device: {}", name);
    }
    let (stream_config, sample_format) = device::negotiate_input(&device, config.sample_rate_hz)?;
    let channels = stream_config.channels as usize;

    fn err_fn(err: cpal::StreamError) {
        error!("audio stream error: {}", err);
    }

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                forward(&chunk_tx, &stats, downmix_to_mono(data, channels));
            },
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                forward(&chunk_tx, &stats, downmix_to_mono(&converted, channels));
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                // Convert unsigned [0,65535] to [-1.0,1.0]
                let converted: Vec<f32> = data
                    .iter()
                    .map(|&s| (s as f32 - 32768.0) / 32768.0)
                    .collect();
                forward(&chunk_tx, &stats, downmix_to_mono(&converted, channels));
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
    Ok(stream)
}

fn forward(chunk_tx: &Sender<Vec<f32>>, stats: &CaptureStats, mono: Vec<f32>) {
    match chunk_tx.try_send(mono) {
        Ok(()) => {
            stats.chunks_captured.fetch_add(1, Ordering::Relaxed);
        }
        Err(TrySendError::Full(_)) => {
            stats.chunks_dropped.fetch_add(1, Ordering::Relaxed);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
    *stats.last_chunk_time.write() = Some(Instant::now());
}

fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_stereo_averages_channels() {
        let interleaved = [0.2f32, 0.4, -1.0, 1.0];
        let mono = downmix_to_mono(&interleaved, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!(mono[1].abs() < 1e-6);
    }

    #[test]
    fn downmix_mono_is_identity() {
        let samples = [0.1f32, -0.2, 0.3];
        assert_eq!(downmix_to_mono(&samples, 1), samples.to_vec());
    }

    #[test]
    fn forward_counts_drops_when_queue_full() {
        let (tx, _rx) = bounded(1);
        let stats = CaptureStats::default();
        forward(&tx, &stats, vec![0.0; 4]);
        forward(&tx, &stats, vec![0.0; 4]);
        assert_eq!(stats.chunks_captured.load(Ordering::Relaxed), 1);
        assert_eq!(stats.chunks_dropped.load(Ordering::Relaxed), 1);
    }
}
