pub mod pattern;
pub mod scheduler;
pub mod metronome;
#[cfg(feature = "device")]
pub mod speaker;

pub use pattern::{select_pattern, DanceStyle, StepPattern};
pub use scheduler::{SchedulerParams, SchedulerTransition, StepScheduler, StepTick};
pub use metronome::{ClickRecorder, ClickSink, ClickTone};
#[cfg(feature = "device")]
pub use speaker::SpeakerClicks;

/// Prompt shown whenever the scheduler is idle.
pub const WAITING_PROMPT: &str = "Waiting for the music...";
