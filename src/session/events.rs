use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

use crate::audio::BeatEvent;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoEvent {
    pub bpm: u32,
    pub timestamp_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptEvent {
    pub label: &'static str,
    pub index: usize,
    pub timestamp_ms: f64,
}

/// Everything the engine publishes to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EngineEvent {
    Beat(BeatEvent),
    Tempo(TempoEvent),
    Prompt(PromptEvent),
}

/// Fan-out of engine events to any number of subscribers.
///
/// Each subscriber gets its own unbounded channel. Subscribers that drop their
/// receiver are pruned on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<EngineEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn publish(&mut self, event: EngineEvent) {
        let before = self.subscribers.len();
        self.subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        if self.subscribers.len() < before {
            log::debug!("Dropped {} closed event subscriber(s)", before - self.subscribers.len());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
