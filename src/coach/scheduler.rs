use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{StepPattern, WAITING_PROMPT};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerParams {
    /// Shortest allowed gap between prompts
    pub min_interval_ms: u64,
    /// Tempos below this are paced as if they were this fast
    pub tempo_floor_bpm: u32,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            min_interval_ms: 280,
            tempo_floor_bpm: 70,
        }
    }
}

impl SchedulerParams {
    pub fn interval_ms(&self, bpm: u32) -> u64 {
        let paced_bpm = bpm.max(self.tempo_floor_bpm).max(1);
        let interval = (60000.0 / paced_bpm as f64).round() as u64;
        interval.max(self.min_interval_ms)
    }
}

/// Outcome of reconciling the scheduler with the current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerTransition {
    Started,
    Restarted,
    Unchanged,
    Stopped,
    StayedIdle,
}

/// One prompt published by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct StepTick {
    pub generation: u64,
    pub index: usize,
    pub label: &'static str,
    pub due_ms: f64,
}

/// The periodic timer backing a running scheduler.
///
/// Deadlines are computed from the start instant so they never accumulate drift.
/// A new generation is issued on every restart; nothing from an older
/// generation can fire.
#[derive(Debug, Clone)]
struct PromptTimer {
    generation: u64,
    interval_ms: u64,
    started_at_ms: f64,
    ticks_fired: u64,
}

impl PromptTimer {
    fn next_due_ms(&self) -> f64 {
        self.started_at_ms + (self.ticks_fired + 1) as f64 * self.interval_ms as f64
    }
}

/// Paces step prompts to the current tempo.
///
/// Idle while playback is stopped or the tempo is unknown. Running otherwise,
/// with one prompt per interval cycling through the active pattern.
pub struct StepScheduler {
    params: SchedulerParams,
    pattern: Option<StepPattern>,
    index: usize,
    timer: Option<PromptTimer>,
    prompt: &'static str,
    generations: u64,
}

impl StepScheduler {
    pub fn new(params: SchedulerParams) -> Self {
        Self {
            params,
            pattern: None,
            index: 0,
            timer: None,
            prompt: WAITING_PROMPT,
            generations: 0,
        }
    }

    /// Reconcile with the session: playing state, tempo, and the pattern for
    /// the current style. Restarts only when the pattern or interval changed.
    pub fn update(&mut self, playing: bool, bpm: u32, pattern: StepPattern, now_ms: f64) -> SchedulerTransition {
        if !playing || bpm == 0 || pattern.is_empty() {
            return self.stop();
        }

        let interval_ms = self.params.interval_ms(bpm);
        if let Some(ref timer) = self.timer {
            if timer.interval_ms == interval_ms && self.pattern == Some(pattern) {
                return SchedulerTransition::Unchanged;
            }
        }

        let was_running = self.timer.is_some();
        self.generations += 1;
        self.timer = Some(PromptTimer {
            generation: self.generations,
            interval_ms,
            started_at_ms: now_ms,
            ticks_fired: 0,
        });
        self.pattern = Some(pattern);
        self.index = 0;

        info!(
            "Step prompts every {}ms at {} BPM: {:?}",
            interval_ms,
            bpm,
            pattern.labels()
        );

        if was_running {
            SchedulerTransition::Restarted
        } else {
            SchedulerTransition::Started
        }
    }

    /// Cancel the timer and fall back to the waiting prompt.
    pub fn stop(&mut self) -> SchedulerTransition {
        self.prompt = WAITING_PROMPT;
        self.index = 0;
        self.pattern = None;
        match self.timer.take() {
            Some(timer) => {
                debug!("Prompt timer generation {} cancelled", timer.generation);
                SchedulerTransition::Stopped
            }
            None => SchedulerTransition::StayedIdle,
        }
    }

    /// Fire the prompt due at `now_ms`, if any.
    ///
    /// When the host fell behind by more than one interval the missed prompts
    /// are skipped rather than delivered in a burst.
    pub fn poll(&mut self, now_ms: f64) -> Option<StepTick> {
        let timer = self.timer.as_mut()?;
        let pattern = self.pattern?;

        let due_ms = timer.next_due_ms();
        if now_ms < due_ms {
            return None;
        }

        let elapsed_ticks = ((now_ms - timer.started_at_ms) / timer.interval_ms as f64).floor() as u64;
        timer.ticks_fired = elapsed_ticks.max(timer.ticks_fired + 1);

        let index = self.index;
        let label = pattern.label_at(index);
        self.index = (index + 1) % pattern.len();
        self.prompt = label;

        Some(StepTick {
            generation: timer.generation,
            index,
            label,
            due_ms,
        })
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn next_due_ms(&self) -> Option<f64> {
        self.timer.as_ref().map(PromptTimer::next_due_ms)
    }

    pub fn interval_ms(&self) -> Option<u64> {
        self.timer.as_ref().map(|t| t.interval_ms)
    }

    pub fn generation(&self) -> Option<u64> {
        self.timer.as_ref().map(|t| t.generation)
    }

    pub fn pattern(&self) -> Option<StepPattern> {
        self.pattern
    }

    /// Most recently published prompt.
    pub fn prompt(&self) -> &'static str {
        self.prompt
    }
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new(SchedulerParams::default())
    }
}
