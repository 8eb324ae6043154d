use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};

use voxturn_foundation::AudioError;

/// Source of fixed-size audio frames for the recorder.
///
/// `next_frame` blocks the calling thread up to `timeout`; `Ok(None)`
/// means no complete frame arrived in time (a poll tick, not an error),
/// which is what lets a concurrent `stop()` be observed between reads.
pub trait FrameSource: Send {
    fn sample_rate(&self) -> u32;

    fn frame_size(&self) -> usize;

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, AudioError>;
}

/// Assembles fixed-size frames from a bounded channel of sample chunks.
///
/// The capture thread produces chunks of whatever size the audio driver
/// delivers; this buffers them and re-slices into classifier frames.
pub struct ChannelFrameSource {
    rx: Receiver<Vec<f32>>,
    pending: VecDeque<f32>,
    frame_size: usize,
    sample_rate: u32,
}

impl ChannelFrameSource {
    pub fn new(rx: Receiver<Vec<f32>>, frame_size: usize, sample_rate: u32) -> Self {
        Self {
            rx,
            pending: VecDeque::new(),
            frame_size,
            sample_rate,
        }
    }

    fn pop_frame(&mut self) -> Option<Vec<f32>> {
        if self.pending.len() < self.frame_size {
            return None;
        }
        Some(self.pending.drain(..self.frame_size).collect())
    }
}

impl FrameSource for ChannelFrameSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Vec<f32>>, AudioError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.pop_frame() {
                return Ok(Some(frame));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    // Drain whatever is left before reporting closure
                    if let Some(frame) = self.pop_frame() {
                        return Ok(Some(frame));
                    }
                    return Err(AudioError::StreamClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn reassembles_frames_across_chunk_boundaries() {
        let (tx, rx) = bounded(8);
        let mut source = ChannelFrameSource::new(rx, 4, 16_000);

        tx.send(vec![1.0, 2.0, 3.0]).unwrap();
        tx.send(vec![4.0, 5.0, 6.0, 7.0, 8.0]).unwrap();

        let first = source.next_frame(Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(first, vec![1.0, 2.0, 3.0, 4.0]);
        let second = source.next_frame(Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(second, vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn timeout_returns_none_not_error() {
        let (_tx, rx) = bounded::<Vec<f32>>(1);
        let mut source = ChannelFrameSource::new(rx, 4, 16_000);
        let got = source.next_frame(Duration::from_millis(10)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn disconnect_drains_then_reports_closed() {
        let (tx, rx) = bounded(8);
        let mut source = ChannelFrameSource::new(rx, 2, 16_000);
        tx.send(vec![1.0, 2.0, 3.0]).unwrap();
        drop(tx);

        let frame = source.next_frame(Duration::from_millis(10)).unwrap();
        assert_eq!(frame, Some(vec![1.0, 2.0]));
        // One leftover sample is not a full frame; the stream is closed.
        let err = source.next_frame(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, AudioError::StreamClosed));
    }
}
