use crossbeam_channel::Receiver;
use log::{info, warn};

use crate::audio::{AudioFrameBlock, BeatDetector, BeatEvent, EnergyAnalyzer, TempoEstimator};
use crate::coach::{select_pattern, ClickSink, DanceStyle, SchedulerTransition, StepPattern, StepScheduler};

use super::{EngineEvent, EngineParameters, EventBus, PromptEvent, SessionConfig, TempoEvent};

/// Owns every stage of the engine and routes values between them.
///
/// Each stage keeps its own state and is the only writer of it; the
/// controller passes energies, beats, and tempos along and publishes the
/// results. Both periodic sources call in here: [`analysis_tick`] once per
/// display frame and [`prompt_tick`] whenever [`next_prompt_due_ms`] comes due.
///
/// [`analysis_tick`]: SessionController::analysis_tick
/// [`prompt_tick`]: SessionController::prompt_tick
/// [`next_prompt_due_ms`]: SessionController::next_prompt_due_ms
pub struct SessionController {
    config: SessionConfig,
    params: EngineParameters,
    energy: EnergyAnalyzer,
    detector: BeatDetector,
    tempo: TempoEstimator,
    scheduler: StepScheduler,
    bus: EventBus,
    click_sink: Option<Box<dyn ClickSink + Send>>,
    playing: bool,
}

impl SessionController {
    pub fn new(config: SessionConfig, params: EngineParameters) -> Self {
        Self {
            energy: EnergyAnalyzer::new(params.block_size),
            detector: BeatDetector::new(params.detector.clone()),
            tempo: TempoEstimator::new(params.tempo.clone()),
            scheduler: StepScheduler::new(params.scheduler.clone()),
            bus: EventBus::new(),
            click_sink: None,
            playing: false,
            config,
            params,
        }
    }

    /// Where metronome clicks go. Without a sink the metronome is silent.
    pub fn with_click_sink(mut self, sink: Box<dyn ClickSink + Send>) -> Self {
        self.click_sink = Some(sink);
        self
    }

    pub fn subscribe(&mut self) -> Receiver<EngineEvent> {
        self.bus.subscribe()
    }

    pub fn start(&mut self, now_ms: f64) {
        if !self.playing {
            info!("Session playing ({} style)", self.config.style);
        }
        self.playing = true;
        self.reconcile_scheduler(now_ms);
    }

    /// Pause or stop playback. The prompt timer is cancelled before this returns.
    pub fn stop(&mut self, now_ms: f64) {
        if self.playing {
            info!("Session stopped");
        }
        self.playing = false;
        self.reconcile_scheduler(now_ms);
    }

    /// Forget the beat history, e.g. when a different track is loaded.
    pub fn reset_analysis(&mut self, now_ms: f64) {
        self.detector.reset();
        self.tempo.reset();
        self.reconcile_scheduler(now_ms);
    }

    pub fn set_style(&mut self, style: DanceStyle, now_ms: f64) {
        if self.config.style != style {
            info!("Dance style {} -> {}", self.config.style, style);
            self.config.style = style;
            self.reconcile_scheduler(now_ms);
        }
    }

    /// Toggle the click; takes effect on the next prompt without restarting the timer.
    pub fn set_metronome(&mut self, enabled: bool) {
        self.config.metronome_enabled = enabled;
    }

    /// Analyse one block. Ignored while not playing.
    pub fn analysis_tick(&mut self, block: &AudioFrameBlock, now_ms: f64) -> Option<BeatEvent> {
        if !self.playing {
            return None;
        }

        let energy = self.energy.analyze_block(block);
        let beat = self.detector.process(energy, now_ms)?;
        self.bus.publish(EngineEvent::Beat(beat));

        if let Some(bpm) = self.tempo.record(beat.timestamp_ms) {
            self.bus.publish(EngineEvent::Tempo(TempoEvent {
                bpm,
                timestamp_ms: now_ms,
            }));
            self.reconcile_scheduler(now_ms);
        }

        Some(beat)
    }

    /// Publish the prompt due at `now_ms`, clicking if the metronome is on.
    pub fn prompt_tick(&mut self, now_ms: f64) -> Option<PromptEvent> {
        let tick = self.scheduler.poll(now_ms)?;
        let event = PromptEvent {
            label: tick.label,
            index: tick.index,
            timestamp_ms: now_ms,
        };
        self.bus.publish(EngineEvent::Prompt(event.clone()));

        if self.config.metronome_enabled {
            if let Some(sink) = self.click_sink.as_mut() {
                if let Err(e) = sink.click(now_ms) {
                    warn!("Metronome click failed: {}", e);
                }
            }
        }

        Some(event)
    }

    fn reconcile_scheduler(&mut self, now_ms: f64) {
        let transition = self
            .scheduler
            .update(self.playing, self.tempo.bpm(), self.pattern(), now_ms);
        if transition == SchedulerTransition::Stopped {
            info!("Step prompts paused");
        }
    }

    pub fn next_prompt_due_ms(&self) -> Option<f64> {
        self.scheduler.next_due_ms()
    }

    /// Current tempo, 0 while unknown.
    pub fn bpm(&self) -> u32 {
        self.tempo.bpm()
    }

    pub fn has_tempo(&self) -> bool {
        self.tempo.has_estimate()
    }

    /// Pattern for the current tempo and style. Only meaningful once `has_tempo()`.
    pub fn pattern(&self) -> StepPattern {
        select_pattern(self.tempo.bpm(), self.config.style)
    }

    pub fn prompt(&self) -> &'static str {
        self.scheduler.prompt()
    }

    pub fn prompt_interval_ms(&self) -> Option<u64> {
        self.scheduler.interval_ms()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_prompting(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn params(&self) -> &EngineParameters {
        &self.params
    }

    pub fn beats_detected(&self) -> u64 {
        self.detector.beats_detected()
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(SessionConfig::default(), EngineParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::{ClickRecorder, WAITING_PROMPT};

    fn loud_block() -> AudioFrameBlock {
        AudioFrameBlock::new(vec![0.5; 2048])
    }

    fn quiet_block() -> AudioFrameBlock {
        AudioFrameBlock::silent(2048)
    }

    /// Feed frames `first..=last` at 60 fps, loud on every `period_frames`th frame.
    fn feed_frames(controller: &mut SessionController, first: usize, last: usize, period_frames: usize) -> f64 {
        let frame_ms = controller.params().frame_period_ms();
        for i in first..=last {
            let block = if i % period_frames == 0 { loud_block() } else { quiet_block() };
            let now = i as f64 * frame_ms;
            controller.analysis_tick(&block, now);
            while controller.next_prompt_due_ms().is_some_and(|due| due <= now) {
                controller.prompt_tick(now);
            }
        }
        last as f64 * frame_ms
    }

    fn feed_beats(controller: &mut SessionController, period_frames: usize, frames: usize) -> f64 {
        feed_frames(controller, 1, frames, period_frames)
    }

    #[test]
    fn test_nothing_happens_before_start() {
        let mut controller = SessionController::default();
        let events = controller.subscribe();
        assert!(controller.analysis_tick(&loud_block(), 0.0).is_none());
        assert_eq!(events.try_iter().count(), 0);
        assert_eq!(controller.prompt(), WAITING_PROMPT);
    }

    #[test]
    fn test_beats_drive_tempo_and_prompts() {
        let mut controller = SessionController::default();
        let events = controller.subscribe();
        controller.start(0.0);

        // 30 frames at 60 fps = 500ms
        feed_beats(&mut controller, 30, 360);
        assert_eq!(controller.bpm(), 120);
        assert!(controller.is_prompting());
        assert_eq!(controller.prompt_interval_ms(), Some(500));

        let events: Vec<EngineEvent> = events.try_iter().collect();
        let beats = events.iter().filter(|e| matches!(e, EngineEvent::Beat(_))).count();
        let tempos = events.iter().filter(|e| matches!(e, EngineEvent::Tempo(_))).count();
        let prompts = events.iter().filter(|e| matches!(e, EngineEvent::Prompt(_))).count();
        assert_eq!(beats, 12);
        assert_eq!(tempos, 8);
        assert!(prompts >= 6);
    }

    #[test]
    fn test_style_change_swaps_pattern() {
        let mut controller = SessionController::default();
        controller.start(0.0);
        let now = feed_beats(&mut controller, 30, 200);
        assert_eq!(controller.pattern().labels(), ["Quick", "Quick", "Slow", "Slow"]);

        controller.set_style(DanceStyle::Waltz, now);
        assert_eq!(controller.pattern().labels(), ["Step", "Side", "Together"]);
        assert_eq!(controller.next_prompt_due_ms(), Some(now + 500.0));
    }

    #[test]
    fn test_stop_returns_to_waiting() {
        let mut controller = SessionController::default();
        controller.start(0.0);
        let now = feed_beats(&mut controller, 30, 300);
        assert_ne!(controller.prompt(), WAITING_PROMPT);

        controller.stop(now);
        assert!(!controller.is_prompting());
        assert_eq!(controller.prompt(), WAITING_PROMPT);
        assert!(controller.prompt_tick(now + 10_000.0).is_none());
        // Tempo survives a pause
        assert_eq!(controller.bpm(), 120);

        controller.start(now);
        assert!(controller.is_prompting());
    }

    #[test]
    fn test_reset_analysis_forgets_tempo() {
        let mut controller = SessionController::default();
        controller.start(0.0);
        let now = feed_beats(&mut controller, 30, 300);
        controller.reset_analysis(now);
        assert_eq!(controller.bpm(), 0);
        assert!(!controller.is_prompting());
        assert_eq!(controller.prompt(), WAITING_PROMPT);
    }

    #[test]
    fn test_metronome_clicks_on_prompts() {
        let recorder = ClickRecorder::default();
        let mut controller = SessionController::new(
            SessionConfig {
                style: DanceStyle::Salsa,
                metronome_enabled: true,
            },
            EngineParameters::default(),
        )
        .with_click_sink(Box::new(recorder.clone()));
        let events = controller.subscribe();
        controller.start(0.0);
        feed_beats(&mut controller, 30, 360);

        let prompt_times: Vec<f64> = events
            .try_iter()
            .filter_map(|e| match e {
                EngineEvent::Prompt(p) => Some(p.timestamp_ms),
                _ => None,
            })
            .collect();
        assert!(!prompt_times.is_empty());
        assert_eq!(recorder.clicks(), prompt_times);

        controller.set_metronome(false);
        let before = recorder.clicks().len();
        feed_frames(&mut controller, 361, 480, 30);
        assert!(controller.is_prompting());
        assert_eq!(recorder.clicks().len(), before);
    }
}
