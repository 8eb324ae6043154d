//! Device selection and stream config negotiation.
//!
//! Streams are opened at exactly the requested sample rate; if no
//! supported config range contains it, the caller gets
//! `FormatNotSupported` rather than a silently resampled stream.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, StreamConfig};
use tracing::info;

use voxturn_foundation::AudioError;

pub fn input_device(name: Option<&str>) -> Result<Device, AudioError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                name: Some(wanted.to_string()),
            }),
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None }),
    }
}

pub fn output_device(name: Option<&str>) -> Result<Device, AudioError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .output_devices()?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                name: Some(wanted.to_string()),
            }),
        None => host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound { name: None }),
    }
}

/// Pick an input config at `sample_rate_hz`, preferring f32 samples.
pub fn negotiate_input(
    device: &Device,
    sample_rate_hz: u32,
) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let mut fallback = None;
    for range in device.supported_input_configs()? {
        if range.min_sample_rate().0 > sample_rate_hz
            || range.max_sample_rate().0 < sample_rate_hz
        {
            continue;
        }
        let config = StreamConfig {
            channels: range.channels(),
            sample_rate: SampleRate(sample_rate_hz),
            buffer_size: BufferSize::Default,
        };
        match range.sample_format() {
            SampleFormat::F32 => {
                info!(
                    sample_rate_hz,
                    channels = config.channels,
                    "negotiated f32 input config"
                );
                return Ok((config, SampleFormat::F32));
            }
            format @ (SampleFormat::I16 | SampleFormat::U16) => {
                fallback.get_or_insert((config, format));
            }
            _ => {}
        }
    }
    fallback.ok_or_else(|| AudioError::FormatNotSupported {
        format: format!("no input config at {} Hz", sample_rate_hz),
    })
}

/// Pick an output config at `sample_rate_hz`, preferring f32 samples.
pub fn negotiate_output(
    device: &Device,
    sample_rate_hz: u32,
) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let mut fallback = None;
    for range in device.supported_output_configs()? {
        if range.min_sample_rate().0 > sample_rate_hz
            || range.max_sample_rate().0 < sample_rate_hz
        {
            continue;
        }
        let config = StreamConfig {
            channels: range.channels(),
            sample_rate: SampleRate(sample_rate_hz),
            buffer_size: BufferSize::Default,
        };
        match range.sample_format() {
            SampleFormat::F32 => {
                info!(
                    sample_rate_hz,
                    channels = config.channels,
                    "negotiated f32 output config"
                );
                return Ok((config, SampleFormat::F32));
            }
            SampleFormat::I16 => {
                fallback.get_or_insert((config, SampleFormat::I16));
            }
            _ => {}
        }
    }
    fallback.ok_or_else(|| AudioError::FormatNotSupported {
        format: format!("no output config at {} Hz", sample_rate_hz),
    })
}
