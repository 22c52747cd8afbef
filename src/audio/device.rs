use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::collections::VecDeque;

use super::{AudioFrameBlock, FrameSource};

/// Live input from the default capture device.
///
/// The cpal callback converts whatever sample format the device delivers to
/// mono `f32` and forwards it over a channel; each analysis tick drains the
/// channel and analyses the most recent window.
pub struct DeviceSource {
    _stream: Stream,
    chunks: Receiver<Vec<f32>>,
    recent: VecDeque<f32>,
    sample_rate: u32,
}

impl DeviceSource {
    /// Fails when no input device exists, its format is unsupported, or the
    /// stream cannot be started.
    pub fn open() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .context("No input device available")?;
        let supported = device
            .default_input_config()
            .context("Failed to query the default input config")?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        info!(
            "Listening on {} ({} ch, {} Hz, {:?})",
            device.name().unwrap_or_else(|_| "unknown device".to_string()),
            config.channels,
            config.sample_rate.0,
            sample_format
        );

        let (sender, chunks) = crossbeam_channel::unbounded();
        let stream = match sample_format {
            SampleFormat::F32 => build_mono_stream::<f32>(&device, &config, sender)?,
            SampleFormat::I16 => build_mono_stream::<i16>(&device, &config, sender)?,
            SampleFormat::U16 => build_mono_stream::<u16>(&device, &config, sender)?,
            SampleFormat::I32 => build_mono_stream::<i32>(&device, &config, sender)?,
            SampleFormat::U8 => build_mono_stream::<u8>(&device, &config, sender)?,
            other => bail!("Unsupported input sample format {:?}", other),
        };
        stream.play().context("Failed to start the input stream")?;

        Ok(Self {
            _stream: stream,
            chunks,
            recent: VecDeque::with_capacity(super::DEFAULT_BLOCK_SIZE * 2),
            sample_rate: config.sample_rate.0,
        })
    }
}

fn build_mono_stream<T>(device: &Device, config: &StreamConfig, sender: Sender<Vec<f32>>) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // A closed receiver means the source is being dropped
            let _ = sender.send(mix_to_mono(data, channels));
        },
        |err| warn!("Input stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

fn mix_to_mono<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    data.chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / channels as f32)
        .collect()
}

impl FrameSource for DeviceSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn block_at(&mut self, _position_ms: f64, block_size: usize) -> Option<AudioFrameBlock> {
        self.recent.extend(self.chunks.try_iter().flatten());
        let excess = self.recent.len().saturating_sub(block_size);
        self.recent.drain(..excess);

        // Pad at the front until the device has delivered a full window
        let mut samples = vec![0.0; block_size - self.recent.len()];
        samples.extend(self.recent.iter().copied());
        Some(AudioFrameBlock::new(samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_stereo_is_mixed_to_float_mono() {
        let mono = mix_to_mono(&[i16::MAX, i16::MAX, 0i16, 0, i16::MIN, 0], 2);
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 1.0).abs() < 1e-3);
        assert_eq!(mono[1], 0.0);
        assert!((mono[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_unsigned_samples_center_on_zero() {
        let mono = mix_to_mono(&[128u8, 128, 255, 255], 1);
        assert_eq!(&mono[..2], &[0.0, 0.0]);
        assert!(mono[2] > 0.99);
    }
}
