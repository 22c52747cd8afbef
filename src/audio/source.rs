use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use super::AudioFrameBlock;

/// Host-side producer of analysis windows.
///
/// The engine asks for the window of `block_size` samples ending at
/// `position_ms` into playback; live sources ignore the position and hand back
/// their most recent samples. `None` means the stream has ended.
pub trait FrameSource {
    fn sample_rate(&self) -> u32;

    fn block_at(&mut self, position_ms: f64, block_size: usize) -> Option<AudioFrameBlock>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn block_at(&mut self, position_ms: f64, block_size: usize) -> Option<AudioFrameBlock> {
        (**self).block_at(position_ms, block_size)
    }
}

fn sample_index(position_ms: f64, sample_rate: u32) -> i64 {
    (position_ms * sample_rate as f64 / 1000.0).round() as i64
}

/// Copy the window ending at `end` out of a buffer, zero-padding before the start.
fn window_from(buffer: &[f32], end: i64, block_size: usize) -> Vec<f32> {
    let start = end - block_size as i64;
    (start..end)
        .map(|i| {
            if i < 0 {
                0.0
            } else {
                buffer.get(i as usize).copied().unwrap_or(0.0)
            }
        })
        .collect()
}

/// Digital silence, optionally limited in length.
pub struct SilenceSource {
    sample_rate: u32,
    duration_ms: Option<f64>,
}

impl SilenceSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            duration_ms: None,
        }
    }

    pub fn with_duration(sample_rate: u32, duration_ms: f64) -> Self {
        Self {
            sample_rate,
            duration_ms: Some(duration_ms),
        }
    }
}

impl FrameSource for SilenceSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn block_at(&mut self, position_ms: f64, block_size: usize) -> Option<AudioFrameBlock> {
        if self.duration_ms.is_some_and(|d| position_ms > d) {
            return None;
        }
        Some(AudioFrameBlock::silent(block_size))
    }
}

/// Synthetic metronome-style click track for exercising the engine.
///
/// Each click is a short burst of square wave, so its RMS over a fully
/// covered window equals `amplitude`.
#[derive(Debug, Clone)]
pub struct ClickTrackSource {
    sample_rate: u32,
    bpm: f64,
    /// Time of the first click
    pub offset_ms: f64,
    pub click_ms: f64,
    pub tone_hz: f64,
    pub amplitude: f32,
    /// Stop clicking after this many clicks
    pub click_count: Option<usize>,
}

impl ClickTrackSource {
    pub fn new(sample_rate: u32, bpm: f64) -> Self {
        Self {
            sample_rate,
            bpm: bpm.max(1.0),
            offset_ms: 260.0,
            click_ms: 40.0,
            tone_hz: 1000.0,
            amplitude: 0.6,
            click_count: None,
        }
    }

    pub fn with_click_count(mut self, count: usize) -> Self {
        self.click_count = Some(count);
        self
    }

    pub fn with_offset_ms(mut self, offset_ms: f64) -> Self {
        self.offset_ms = offset_ms;
        self
    }

    pub fn period_ms(&self) -> f64 {
        60000.0 / self.bpm
    }

    fn sample(&self, index: i64) -> f32 {
        let t_ms = index as f64 * 1000.0 / self.sample_rate as f64 - self.offset_ms;
        if t_ms < 0.0 {
            return 0.0;
        }

        let click = (t_ms / self.period_ms()).floor();
        if self.click_count.is_some_and(|n| click >= n as f64) {
            return 0.0;
        }

        let within = t_ms - click * self.period_ms();
        if within >= self.click_ms {
            return 0.0;
        }

        let half_cycle = 500.0 / self.tone_hz;
        if ((within / half_cycle).floor() as i64) % 2 == 0 {
            self.amplitude
        } else {
            -self.amplitude
        }
    }
}

impl FrameSource for ClickTrackSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn block_at(&mut self, position_ms: f64, block_size: usize) -> Option<AudioFrameBlock> {
        let end = sample_index(position_ms, self.sample_rate);
        let samples = (end - block_size as i64..end).map(|i| self.sample(i)).collect();
        Some(AudioFrameBlock::new(samples))
    }
}

/// PCM WAV file mixed down to mono and served by playback position.
pub struct WavSource {
    sample_rate: u32,
    samples: Vec<f32>,
}

impl WavSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .context("Failed to read float samples")?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .context("Failed to read integer samples")?
            }
        };

        let samples: Vec<f32> = interleaved
            .chunks_exact(channels)
            .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
            .collect();

        info!(
            "Loaded WAV {} ({}Hz, {} channels, {:.2}s)",
            path.display(),
            spec.sample_rate,
            channels,
            samples.len() as f32 / spec.sample_rate as f32
        );

        Ok(Self::from_samples(spec.sample_rate, samples))
    }

    pub fn from_samples(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self { sample_rate, samples }
    }

    pub fn duration_ms(&self) -> f64 {
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }
}

impl FrameSource for WavSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn block_at(&mut self, position_ms: f64, block_size: usize) -> Option<AudioFrameBlock> {
        if position_ms > self.duration_ms() {
            return None;
        }
        let end = sample_index(position_ms, self.sample_rate);
        Some(AudioFrameBlock::new(window_from(&self.samples, end, block_size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::EnergyAnalyzer;

    #[test]
    fn test_click_track_is_silent_between_clicks() {
        let mut source = ClickTrackSource::new(44100, 120.0);
        let analyzer = EnergyAnalyzer::default();

        // Window ending at 200ms lies entirely before the first click
        let block = source.block_at(200.0, 2048).unwrap();
        assert_eq!(block.len(), 2048);
        assert_eq!(analyzer.analyze_block(&block), 0.0);

        // Window ending at 300ms covers most of the 40ms click
        let energy = analyzer.analyze_block(&source.block_at(300.0, 2048).unwrap());
        assert!(energy > 0.5 && energy < 0.6, "energy {}", energy);
    }

    #[test]
    fn test_click_count_limits_the_track() {
        let mut source = ClickTrackSource::new(44100, 120.0).with_click_count(2);
        let analyzer = EnergyAnalyzer::default();
        assert!(analyzer.analyze_block(&source.block_at(800.0, 2048).unwrap()) > 0.0);
        assert_eq!(analyzer.analyze_block(&source.block_at(1300.0, 2048).unwrap()), 0.0);
    }

    #[test]
    fn test_silence_source_ends_after_duration() {
        let mut source = SilenceSource::with_duration(48000, 1000.0);
        assert!(source.block_at(999.0, 1024).is_some());
        assert!(source.block_at(1001.0, 1024).is_none());
    }

    #[test]
    fn test_wav_window_is_zero_padded_at_start() {
        let mut source = WavSource::from_samples(1000, vec![1.0; 2000]);
        // 10ms in at 1kHz is 10 samples, the rest of the window precedes the file
        let block = source.block_at(10.0, 64).unwrap();
        assert_eq!(block.samples.iter().filter(|&&s| s == 1.0).count(), 10);
        assert!(source.block_at(2500.0, 64).is_none());
    }

    #[test]
    fn test_wav_round_trip_through_hound() -> Result<()> {
        let path = std::env::temp_dir().join(format!("rhythm_coach_source_{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec)?;
        for _ in 0..8000 {
            writer.write_sample(16384i16)?;
            writer.write_sample(-16384i16)?;
        }
        writer.finalize()?;

        let mut source = WavSource::open(&path)?;
        std::fs::remove_file(&path)?;

        assert_eq!(source.sample_rate(), 8000);
        assert!((source.duration_ms() - 1000.0).abs() < 1e-6);
        // Opposite channels cancel in the mono mix
        let block = source.block_at(500.0, 256).unwrap();
        assert!(block.samples.iter().all(|s| s.abs() < 1e-6));
        Ok(())
    }
}
