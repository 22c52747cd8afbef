pub mod energy;
pub mod beat_detector;
pub mod tempo;
pub mod source;
#[cfg(feature = "device")]
pub mod device;

pub use energy::EnergyAnalyzer;
pub use beat_detector::{BeatDetector, DetectorParams, DetectorState};
pub use tempo::{TempoEstimator, TempoParams};
pub use source::{ClickTrackSource, FrameSource, SilenceSource, WavSource};
#[cfg(feature = "device")]
pub use device::DeviceSource;

use serde::{Deserialize, Serialize};

/// Default analysis window, matching a 2048-point analyser.
pub const DEFAULT_BLOCK_SIZE: usize = 2048;

/// One analysis window of mono time-domain samples in [-1, 1].
///
/// Handed to the engine once per analysis tick and dropped afterwards.
#[derive(Debug, Clone)]
pub struct AudioFrameBlock {
    pub samples: Vec<f32>,
}

impl AudioFrameBlock {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn silent(block_size: usize) -> Self {
        Self {
            samples: vec![0.0; block_size],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for AudioFrameBlock {
    fn default() -> Self {
        Self::silent(DEFAULT_BLOCK_SIZE)
    }
}

/// A detected rhythmic onset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Milliseconds since the session started playing
    pub timestamp_ms: f64,
    /// Raw RMS energy that triggered the beat (not normalized)
    pub intensity: f32,
}
