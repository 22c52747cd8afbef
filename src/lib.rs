//! Real-time beat detection and tempo tracking that paces dance step prompts.
//!
//! Audio arrives as [`audio::AudioFrameBlock`]s from a host-side
//! [`audio::FrameSource`]. Each analysis tick reduces a block to an RMS energy,
//! the [`audio::BeatDetector`] turns the energy stream into beats, the
//! [`audio::TempoEstimator`] turns beats into a BPM figure, and the
//! [`coach::StepScheduler`] cycles through the step pattern for the current
//! tempo and dance style. [`session::SessionController`] wires it together and
//! publishes everything on an [`session::EventBus`].

pub mod audio;
pub mod coach;
pub mod session;

pub use audio::{AudioFrameBlock, BeatEvent, FrameSource};
pub use coach::{DanceStyle, StepPattern, WAITING_PROMPT};
pub use session::{EngineEvent, EngineParameters, SessionConfig, SessionController};
