use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Receives one audible click per scheduler tick while the metronome is on.
pub trait ClickSink {
    fn click(&mut self, at_ms: f64) -> Result<()>;
}

/// Short square-wave blip used as the metronome click.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickTone {
    pub frequency_hz: f32,
    pub gain: f32,
    pub duration_ms: f32,
}

impl Default for ClickTone {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            gain: 0.15,
            duration_ms: 40.0,
        }
    }
}

impl ClickTone {
    pub fn render(&self, sample_rate: u32) -> Vec<f32> {
        let len = (self.duration_ms * sample_rate as f32 / 1000.0).round() as usize;
        let samples_per_half_cycle = sample_rate as f32 / (2.0 * self.frequency_hz.max(1.0));
        (0..len)
            .map(|i| {
                if ((i as f32 / samples_per_half_cycle) as usize) % 2 == 0 {
                    self.gain
                } else {
                    -self.gain
                }
            })
            .collect()
    }
}

/// Collects click times so they can be rendered to an audio track later.
///
/// Clones share the same click list, so a host can keep one handle while the
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct ClickRecorder {
    clicks: Arc<Mutex<Vec<f64>>>,
    tone: ClickTone,
}

impl ClickRecorder {
    pub fn new(tone: ClickTone) -> Self {
        Self {
            clicks: Arc::new(Mutex::new(Vec::new())),
            tone,
        }
    }

    pub fn clicks(&self) -> Vec<f64> {
        self.clicks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Mix every recorded click into a mono track of the given length.
    pub fn render_track(&self, sample_rate: u32, duration_ms: f64) -> Vec<f32> {
        let len = (duration_ms * sample_rate as f64 / 1000.0).ceil() as usize;
        let mut track = vec![0.0f32; len];
        let click = self.tone.render(sample_rate);

        for at_ms in self.clicks() {
            let start = (at_ms * sample_rate as f64 / 1000.0).round() as usize;
            for (dst, &src) in track.iter_mut().skip(start).zip(click.iter()) {
                *dst = (*dst + src).clamp(-1.0, 1.0);
            }
        }
        track
    }

    pub fn write_wav<P: AsRef<Path>>(&self, path: P, sample_rate: u32, duration_ms: f64) -> Result<()> {
        let path = path.as_ref();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for sample in self.render_track(sample_rate, duration_ms) {
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;

        info!("Wrote {} metronome clicks to {}", self.clicks().len(), path.display());
        Ok(())
    }
}

impl ClickSink for ClickRecorder {
    fn click(&mut self, at_ms: f64) -> Result<()> {
        self.clicks
            .lock()
            .map_err(|_| anyhow::anyhow!("Click list lock poisoned"))?
            .push(at_ms);
        Ok(())
    }
}

/// Every sink hears every click; the first failure is reported after all have run.
impl ClickSink for Vec<Box<dyn ClickSink + Send>> {
    fn click(&mut self, at_ms: f64) -> Result<()> {
        let mut first_error = None;
        for sink in self.iter_mut() {
            if let Err(e) = sink.click(at_ms) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
