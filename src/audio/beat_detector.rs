use super::BeatEvent;
use serde::{Deserialize, Serialize};

/// Tuning constants for the rising-edge energy detector.
///
/// The defaults are empirical and the tempo tests depend on them exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Threshold value before any audio has been seen
    pub initial_threshold: f64,
    /// Weight kept by the threshold envelope on each tick
    pub threshold_decay: f64,
    /// Weight given to the new (biased) energy in the threshold envelope
    pub threshold_weight: f64,
    /// Multiplier applied to the energy feeding the threshold envelope
    pub threshold_bias: f64,
    /// Minimum rise above the trailing energy for an onset
    pub rise_epsilon: f64,
    /// Ticks suppressed after a beat fires
    pub refractory_ticks: u32,
    /// Weight kept by the trailing energy average on each tick
    pub trailing_decay: f64,
    /// Weight given to the new energy in the trailing average
    pub trailing_weight: f64,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            initial_threshold: 0.25,
            threshold_decay: 0.98,
            threshold_weight: 0.02,
            threshold_bias: 1.5,
            rise_epsilon: 0.02,
            refractory_ticks: 6,
            trailing_decay: 0.9,
            trailing_weight: 0.1,
        }
    }
}

/// Rolling state owned by the detector. Nothing else writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorState {
    pub smoothed_threshold: f64,
    pub trailing_energy: f64,
    pub cooldown_frames_remaining: u32,
}

/// Classifies each energy sample as beat or not beat.
///
/// A beat needs the energy to rise sharply above its trailing average and to
/// sit above a slow envelope biased 50% over recent energy. After firing, the
/// detector stays deaf for a fixed number of ticks so one transient cannot
/// trigger twice. Noisy percussive material will misfire and very smooth
/// material will undercount; both are accepted behavior.
pub struct BeatDetector {
    params: DetectorParams,
    state: DetectorState,
    beats_detected: u64,
}

impl BeatDetector {
    pub fn new(params: DetectorParams) -> Self {
        let state = Self::initial_state(&params);
        Self {
            params,
            state,
            beats_detected: 0,
        }
    }

    fn initial_state(params: &DetectorParams) -> DetectorState {
        DetectorState {
            smoothed_threshold: params.initial_threshold.max(0.0),
            trailing_energy: 0.0,
            cooldown_frames_remaining: 0,
        }
    }

    /// Feed one energy sample taken at `timestamp_ms`.
    pub fn process(&mut self, energy: f32, timestamp_ms: f64) -> Option<BeatEvent> {
        let intensity = if energy.is_finite() { energy.max(0.0) } else { 0.0 };
        // Envelope math runs in f64 so the weights stay exact
        let e = intensity as f64;
        let p = &self.params;
        let s = &mut self.state;

        s.smoothed_threshold = p.threshold_decay * s.smoothed_threshold + p.threshold_weight * e * p.threshold_bias;

        let rising = e - s.trailing_energy > p.rise_epsilon;
        let beat = if s.cooldown_frames_remaining == 0 && rising && e > s.smoothed_threshold {
            s.cooldown_frames_remaining = p.refractory_ticks;
            Some(BeatEvent { timestamp_ms, intensity })
        } else {
            s.cooldown_frames_remaining = s.cooldown_frames_remaining.saturating_sub(1);
            None
        };

        s.trailing_energy = p.trailing_decay * s.trailing_energy + p.trailing_weight * e;

        if let Some(ref event) = beat {
            self.beats_detected += 1;
            log::debug!(
                "Beat #{} at {:.1}ms (energy {:.4}, threshold {:.4})",
                self.beats_detected,
                event.timestamp_ms,
                e,
                self.state.smoothed_threshold
            );
        }

        beat
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    pub fn beats_detected(&self) -> u64 {
        self.beats_detected
    }

    pub fn reset(&mut self) {
        self.state = Self::initial_state(&self.params);
        self.beats_detected = 0;
    }
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new(DetectorParams::default())
    }
}
