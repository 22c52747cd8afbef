use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoParams {
    /// Beat timestamps kept for estimation; the oldest is evicted first
    pub history_capacity: usize,
    /// Timestamps required before a BPM figure is produced
    pub min_history: usize,
    pub min_bpm: u32,
    pub max_bpm: u32,
}

impl Default for TempoParams {
    fn default() -> Self {
        Self {
            history_capacity: 16,
            min_history: 5,
            min_bpm: 60,
            max_bpm: 180,
        }
    }
}

/// Mean intervals shorter than this are treated as degenerate.
const MIN_INTERVAL_MS: f64 = 1e-3;

/// Turns beat timestamps into a stable BPM figure.
///
/// Keeps a bounded history of recent beats and recomputes the tempo on every
/// new beat from the trimmed mean of the inter-beat intervals. A BPM of 0
/// means no estimate yet.
pub struct TempoEstimator {
    params: TempoParams,
    beat_times: VecDeque<f64>,
    bpm: u32,
}

impl TempoEstimator {
    pub fn new(params: TempoParams) -> Self {
        let capacity = params.history_capacity.max(2);
        Self {
            params,
            beat_times: VecDeque::with_capacity(capacity),
            bpm: 0,
        }
    }

    /// Record a beat. Returns the recomputed BPM when enough history exists.
    pub fn record(&mut self, timestamp_ms: f64) -> Option<u32> {
        self.beat_times.push_back(timestamp_ms);
        while self.beat_times.len() > self.params.history_capacity.max(2) {
            self.beat_times.pop_front();
        }

        if self.beat_times.len() < self.params.min_history.max(2) {
            return None;
        }

        let intervals: Vec<f64> = self
            .beat_times
            .iter()
            .zip(self.beat_times.iter().skip(1))
            .map(|(a, b)| b - a)
            .collect();

        let average_ms = Self::trimmed_mean(&intervals);
        if !average_ms.is_finite() || average_ms < MIN_INTERVAL_MS {
            log::debug!("Ignoring degenerate beat interval {:.4}ms, keeping {} BPM", average_ms, self.bpm);
            return None;
        }

        let raw_bpm = 60000.0 / average_ms;
        let bpm = raw_bpm
            .clamp(self.params.min_bpm as f64, self.params.max_bpm as f64)
            .round() as u32;

        if bpm != self.bpm {
            log::info!("Tempo estimate {} -> {} BPM ({:.1}ms average interval)", self.bpm, bpm, average_ms);
        }
        self.bpm = bpm;
        Some(bpm)
    }

    /// Mean after dropping the single smallest and largest interval, as long
    /// as at least two intervals survive the trim.
    fn trimmed_mean(intervals: &[f64]) -> f64 {
        let mut sorted = intervals.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let used: &[f64] = if sorted.len() >= 4 {
            &sorted[1..sorted.len() - 1]
        } else {
            intervals
        };

        if used.is_empty() {
            return 0.0;
        }
        used.iter().sum::<f64>() / used.len() as f64
    }

    /// Current estimate, 0 when unknown.
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn has_estimate(&self) -> bool {
        self.bpm > 0
    }

    pub fn history_len(&self) -> usize {
        self.beat_times.len()
    }

    pub fn reset(&mut self) {
        self.beat_times.clear();
        self.bpm = 0;
    }
}

impl Default for TempoEstimator {
    fn default() -> Self {
        Self::new(TempoParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(estimator: &mut TempoEstimator, times: &[f64]) -> Vec<Option<u32>> {
        times.iter().map(|&t| estimator.record(t)).collect()
    }

    fn beat_train(start: f64, interval: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| start + interval * i as f64).collect()
    }

    #[test]
    fn test_no_estimate_until_five_beats() {
        let mut estimator = TempoEstimator::default();
        let results = feed(&mut estimator, &beat_train(0.0, 500.0, 5));
        assert_eq!(results[..4], [None, None, None, None]);
        assert_eq!(results[4], Some(120));
        assert_eq!(estimator.bpm(), 120);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut estimator = TempoEstimator::default();
        feed(&mut estimator, &beat_train(0.0, 500.0, 40));
        assert_eq!(estimator.history_len(), 16);
    }

    #[test]
    fn test_old_beats_are_evicted_first() {
        let mut estimator = TempoEstimator::default();
        // A slow start followed by 16 fast beats leaves only the fast ones
        let mut times = beat_train(0.0, 1000.0, 6);
        let last = *times.last().unwrap();
        times.extend(beat_train(last + 400.0, 400.0, 16));
        feed(&mut estimator, &times);
        assert_eq!(estimator.bpm(), 150);
    }

    #[test]
    fn test_single_outlier_is_trimmed() {
        let mut estimator = TempoEstimator::default();
        // One short interval, the rest of the train shifted after it
        let mut times = beat_train(0.0, 500.0, 4);
        times.extend(beat_train(1600.0, 500.0, 4));
        feed(&mut estimator, &times);
        assert_eq!(estimator.bpm(), 120);

        let mut estimator = TempoEstimator::default();
        // One early detection: a short interval followed by a long one
        let mut times = beat_train(0.0, 500.0, 8);
        times[4] -= 150.0;
        feed(&mut estimator, &times);
        assert_eq!(estimator.bpm(), 120);

        let mut estimator = TempoEstimator::default();
        // One missed detection
        let mut times = beat_train(0.0, 500.0, 8);
        times.remove(4);
        feed(&mut estimator, &times);
        assert!((estimator.bpm() as i64 - 120).abs() <= 2);
    }

    #[test]
    fn test_untrimmed_mean_would_shift() {
        let intervals = [500.0, 500.0, 500.0, 100.0, 500.0];
        let plain = intervals.iter().sum::<f64>() / intervals.len() as f64;
        let trimmed = TempoEstimator::trimmed_mean(&intervals);
        assert_eq!(trimmed, 500.0);
        assert!(plain < 450.0);
    }

    #[test]
    fn test_bpm_is_clamped() {
        for interval in [50.0, 200.0, 333.0, 1000.0, 1500.0, 5000.0] {
            let mut estimator = TempoEstimator::default();
            feed(&mut estimator, &beat_train(0.0, interval, 8));
            let bpm = estimator.bpm();
            assert!((60..=180).contains(&bpm), "interval {} gave {} BPM", interval, bpm);
        }
    }

    #[test]
    fn test_zero_intervals_keep_prior_bpm() {
        let mut estimator = TempoEstimator::default();
        feed(&mut estimator, &beat_train(0.0, 500.0, 16));
        assert_eq!(estimator.bpm(), 120);

        // Repeated timestamps shrink the trimmed mean until it hits zero
        let results = feed(&mut estimator, &[7500.0; 15]);
        assert_eq!(results[12], Some(180));
        assert_eq!(results[13], None);
        assert_eq!(results[14], None);
        assert_eq!(estimator.bpm(), 180);
        assert!(estimator.has_estimate());

        let mut estimator = TempoEstimator::default();
        let results = feed(&mut estimator, &[1000.0; 6]);
        assert!(results.iter().all(Option::is_none));
        assert_eq!(estimator.bpm(), 0);
    }

    #[test]
    fn test_reset_clears_estimate() {
        let mut estimator = TempoEstimator::default();
        feed(&mut estimator, &beat_train(0.0, 500.0, 6));
        estimator.reset();
        assert_eq!(estimator.bpm(), 0);
        assert_eq!(estimator.history_len(), 0);
        assert!(!estimator.has_estimate());
    }
}
