pub mod config;
pub mod events;
pub mod controller;
pub mod runtime;

pub use config::{EngineParameters, SessionConfig};
pub use events::{EngineEvent, EventBus, PromptEvent, TempoEvent};
pub use controller::SessionController;
pub use runtime::{drive_offline, run_session};
