//! The two periodic sources that drive a session.
//!
//! Analysis ticks arrive at the display frame rate; prompt ticks arrive
//! whenever the step scheduler's deadline comes due. Both run on one thread
//! and only meet inside [`SessionController`].

use anyhow::Result;
use log::{info, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};

use super::SessionController;
use crate::audio::FrameSource;

/// Run a session against a virtual clock, as fast as the CPU allows.
///
/// Analysis frames and prompt deadlines are interleaved in time order, with a
/// prompt winning a tie. Stops the session when `duration_ms` is reached or the
/// source runs dry, and returns the number of analysis ticks processed.
pub fn drive_offline<S>(controller: &mut SessionController, source: &mut S, duration_ms: f64) -> u64
where
    S: FrameSource + ?Sized,
{
    let rate_hz = controller.params().analysis_rate_hz.max(1.0);
    let block_size = controller.params().block_size;
    let mut frames = 0u64;
    let mut end_ms = duration_ms;

    controller.start(0.0);
    loop {
        let frame_at = frames as f64 * 1000.0 / rate_hz;

        if let Some(due) = controller.next_prompt_due_ms() {
            if due <= frame_at && due <= duration_ms {
                controller.prompt_tick(due);
                continue;
            }
        }

        if frame_at > duration_ms {
            break;
        }

        match source.block_at(frame_at, block_size) {
            Some(block) => {
                controller.analysis_tick(&block, frame_at);
            }
            None => {
                info!("Frame source finished at {:.0}ms", frame_at);
                end_ms = frame_at;
                break;
            }
        }
        frames += 1;
    }
    controller.stop(end_ms);

    frames
}

/// Run a session in real time until `stop` flips to true or its sender is dropped.
///
/// A source that failed to open is not fatal: the session keeps running with
/// no analysis, so the tempo stays unknown and the prompt stays waiting. When
/// the loop exits both periodic sources are already cancelled; the source is
/// released only after that. Returns the number of analysis ticks processed.
pub async fn run_session<S>(
    controller: &mut SessionController,
    source: Result<S>,
    mut stop: watch::Receiver<bool>,
) -> u64
where
    S: FrameSource,
{
    let mut source = match source {
        Ok(source) => Some(source),
        Err(e) => {
            warn!("Audio input unavailable, running without beat detection: {:#}", e);
            None
        }
    };

    let block_size = controller.params().block_size;
    let frame_period = Duration::from_secs_f64(controller.params().frame_period_ms() / 1000.0);
    let start = Instant::now();
    let elapsed_ms = |at: Instant| at.duration_since(start).as_secs_f64() * 1000.0;

    let mut frames = tokio::time::interval_at(start, frame_period);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut analysis_ticks = 0u64;

    controller.start(0.0);
    loop {
        let prompt_due_ms = controller.next_prompt_due_ms();
        let prompt_deadline = prompt_due_ms.map(|ms| start + Duration::from_secs_f64(ms / 1000.0));

        tokio::select! {
            biased;

            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }

            _ = sleep_until(prompt_deadline.unwrap_or(start)), if prompt_deadline.is_some() => {
                // Never report a prompt earlier than it was due
                let now = elapsed_ms(Instant::now()).max(prompt_due_ms.unwrap_or(0.0));
                controller.prompt_tick(now);
            }

            tick = frames.tick(), if source.is_some() => {
                let now = elapsed_ms(tick);
                let block = source.as_mut().and_then(|s| s.block_at(now, block_size));
                match block {
                    Some(block) => {
                        controller.analysis_tick(&block, now);
                        analysis_ticks += 1;
                    }
                    None => {
                        info!("Frame source finished at {:.0}ms", now);
                        break;
                    }
                }
            }
        }
    }

    controller.stop(elapsed_ms(Instant::now()));
    drop(source);

    analysis_ticks
}
