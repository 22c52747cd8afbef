use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dance styles the coach knows step patterns for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DanceStyle {
    #[default]
    Freestyle,
    Salsa,
    Waltz,
    #[serde(rename = "Hip-Hop")]
    HipHop,
}

impl DanceStyle {
    pub const ALL: [DanceStyle; 4] = [
        DanceStyle::Freestyle,
        DanceStyle::Salsa,
        DanceStyle::Waltz,
        DanceStyle::HipHop,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DanceStyle::Freestyle => "Freestyle",
            DanceStyle::Salsa => "Salsa",
            DanceStyle::Waltz => "Waltz",
            DanceStyle::HipHop => "Hip-Hop",
        }
    }
}

impl fmt::Display for DanceStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DanceStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "freestyle" => Ok(DanceStyle::Freestyle),
            "salsa" => Ok(DanceStyle::Salsa),
            "waltz" => Ok(DanceStyle::Waltz),
            "hiphop" => Ok(DanceStyle::HipHop),
            _ => Err(anyhow::anyhow!(
                "Unknown dance style '{}' (expected Freestyle, Salsa, Waltz or Hip-Hop)",
                s
            )),
        }
    }
}

/// An ordered cycle of step labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPattern(&'static [&'static str]);

impl StepPattern {
    pub fn labels(&self) -> &'static [&'static str] {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label for a step counter, wrapping around the pattern.
    pub fn label_at(&self, index: usize) -> &'static str {
        self.0[index % self.0.len()]
    }
}

const FREESTYLE_SLOW: StepPattern = StepPattern(&["Step", "Step", "Rock", "Recover"]);
const FREESTYLE_MEDIUM: StepPattern = StepPattern(&["Left", "Right", "Left", "Right"]);
const FREESTYLE_UPBEAT: StepPattern = StepPattern(&["Quick", "Quick", "Slow", "Slow"]);
const FREESTYLE_FAST: StepPattern = StepPattern(&["Step", "Together", "Step", "Together"]);
// 1-2-3 hold 4, 5-6-7 hold 8
const SALSA: StepPattern = StepPattern(&["Quick", "Quick", "Slow", "Hold"]);
const WALTZ: StepPattern = StepPattern(&["Step", "Side", "Together"]);
const HIP_HOP: StepPattern = StepPattern(&["Bounce", "Bounce", "Step", "Groove"]);

/// Step pattern for a tempo and style. Only Freestyle depends on the tempo.
///
/// A BPM of 0 (unknown) falls into the slowest Freestyle band.
pub fn select_pattern(bpm: u32, style: DanceStyle) -> StepPattern {
    match style {
        DanceStyle::Freestyle => match bpm {
            0..=89 => FREESTYLE_SLOW,
            90..=114 => FREESTYLE_MEDIUM,
            115..=134 => FREESTYLE_UPBEAT,
            _ => FREESTYLE_FAST,
        },
        DanceStyle::Salsa => SALSA,
        DanceStyle::Waltz => WALTZ,
        DanceStyle::HipHop => HIP_HOP,
    }
}
