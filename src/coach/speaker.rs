use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use std::thread::JoinHandle;

use super::{ClickSink, ClickTone};

const CLICK_SAMPLE_RATE: u32 = 48000;

/// Plays each metronome click on the default output device.
///
/// rodio's output stream cannot leave the thread that opened it, so a
/// dedicated thread owns the stream and this handle only signals it. Clicks
/// start as soon as they are signalled.
pub struct SpeakerClicks {
    trigger: Option<Sender<()>>,
    output: Option<JoinHandle<()>>,
}

impl SpeakerClicks {
    pub fn open(tone: ClickTone) -> Result<Self> {
        let (trigger, pending) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let output = std::thread::Builder::new()
            .name("metronome-output".to_string())
            .spawn(move || {
                let opened = OutputStream::try_default()
                    .context("No output device available")
                    .and_then(|(stream, handle)| {
                        let sink = Sink::try_new(&handle).context("Failed to open an output sink")?;
                        Ok((stream, sink))
                    });
                let (_stream, sink) = match opened {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                play_clicks(&pending, &tone, CLICK_SAMPLE_RATE, |samples| {
                    sink.append(SamplesBuffer::new(1, CLICK_SAMPLE_RATE, samples));
                });
                sink.stop();
            })
            .context("Failed to spawn the metronome output thread")?;

        ready_rx
            .recv()
            .map_err(|_| anyhow!("Metronome output thread exited early"))??;

        Ok(Self {
            trigger: Some(trigger),
            output: Some(output),
        })
    }
}

/// Render one click per signal until every trigger is dropped.
fn play_clicks<F>(pending: &Receiver<()>, tone: &ClickTone, sample_rate: u32, mut play: F)
where
    F: FnMut(Vec<f32>),
{
    let click = tone.render(sample_rate);
    for () in pending.iter() {
        play(click.clone());
    }
    debug!("Metronome output finished");
}

impl ClickSink for SpeakerClicks {
    fn click(&mut self, _at_ms: f64) -> Result<()> {
        self.trigger
            .as_ref()
            .ok_or_else(|| anyhow!("Metronome output closed"))?
            .send(())
            .map_err(|_| anyhow!("Metronome output thread stopped"))
    }
}

impl Drop for SpeakerClicks {
    fn drop(&mut self) {
        self.trigger.take();
        if let Some(output) = self.output.take() {
            if output.join().is_err() {
                warn!("Metronome output thread panicked");
            }
        }
    }
}
