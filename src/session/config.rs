use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::audio::{DetectorParams, TempoParams, DEFAULT_BLOCK_SIZE};
use crate::coach::{ClickTone, DanceStyle, SchedulerParams};

/// User-facing session options. Lives only as long as the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub style: DanceStyle,
    pub metronome_enabled: bool,
}

/// Engine tuning: analysis cadence plus the constants of each stage.
///
/// The defaults reproduce the reference heuristic; a JSON file only needs to
/// name the fields it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParameters {
    /// Samples per analysis window
    pub block_size: usize,
    /// Analysis ticks per second, one per display frame
    pub analysis_rate_hz: f64,
    pub detector: DetectorParams,
    pub tempo: TempoParams,
    pub scheduler: SchedulerParams,
    pub click: ClickTone,
}

impl Default for EngineParameters {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            analysis_rate_hz: 60.0,
            detector: DetectorParams::default(),
            tempo: TempoParams::default(),
            scheduler: SchedulerParams::default(),
            click: ClickTone::default(),
        }
    }
}

impl EngineParameters {
    pub fn frame_period_ms(&self) -> f64 {
        1000.0 / self.analysis_rate_hz.max(1.0)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write parameters to {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read parameters from {}", path.as_ref().display()))?;
        let params = serde_json::from_str(&json).context("Invalid engine parameters")?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.style, DanceStyle::Freestyle);
        assert!(!config.metronome_enabled);

        let params = EngineParameters::default();
        assert_eq!(params.block_size, 2048);
        assert_eq!(params.detector.refractory_ticks, 6);
        assert_eq!(params.detector.rise_epsilon, 0.02);
        assert_eq!(params.tempo.history_capacity, 16);
        assert_eq!(params.scheduler.min_interval_ms, 280);
    }

    #[test]
    fn test_partial_json_keeps_defaults() -> Result<()> {
        let params: EngineParameters =
            serde_json::from_str(r#"{ "analysis_rate_hz": 30.0, "detector": { "refractory_ticks": 3 } }"#)?;
        assert_eq!(params.analysis_rate_hz, 30.0);
        assert_eq!(params.detector.refractory_ticks, 3);
        assert_eq!(params.detector.threshold_decay, 0.98);
        assert_eq!(params.block_size, 2048);
        Ok(())
    }

    #[test]
    fn test_style_uses_display_names_in_json() -> Result<()> {
        let config = SessionConfig {
            style: DanceStyle::HipHop,
            metronome_enabled: true,
        };
        let json = serde_json::to_string(&config)?;
        assert!(json.contains("\"Hip-Hop\""));
        assert_eq!(serde_json::from_str::<SessionConfig>(&json)?, config);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let path = std::env::temp_dir().join(format!("rhythm_coach_params_{}.json", std::process::id()));
        let mut params = EngineParameters::default();
        params.tempo.min_history = 4;
        params.save(&path)?;

        let loaded = EngineParameters::load(&path)?;
        std::fs::remove_file(&path)?;
        assert_eq!(loaded.tempo.min_history, 4);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(EngineParameters::load("/nonexistent/rhythm_coach.json").is_err());
    }
}
