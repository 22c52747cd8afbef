use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::time::Duration;

use rhythm_coach::audio::{ClickTrackSource, FrameSource, WavSource};
use rhythm_coach::coach::{ClickRecorder, ClickSink, ClickTone};
use rhythm_coach::session::{drive_offline, run_session};
use rhythm_coach::{DanceStyle, EngineEvent, EngineParameters, SessionConfig, SessionController};

#[derive(Parser)]
#[command(name = "coach-demo")]
#[command(about = "Follow dance step prompts paced to the beat of a track")]
struct Args {
    /// PCM WAV file to dance to (defaults to a synthetic click track)
    #[arg(long)]
    wav: Option<String>,

    /// Tempo of the synthetic click track
    #[arg(long, default_value = "120")]
    click_bpm: f64,

    /// Listen to the default input device instead of a file (implies --realtime)
    #[arg(long)]
    device: bool,

    /// Dance style: Freestyle, Salsa, Waltz or Hip-Hop
    #[arg(long, default_value = "Freestyle")]
    style: DanceStyle,

    /// Click on every prompt
    #[arg(long)]
    metronome: bool,

    /// How long to run
    #[arg(long, default_value = "10")]
    seconds: f64,

    /// Pace the session with the wall clock instead of simulating it
    #[arg(long)]
    realtime: bool,

    /// Engine parameters JSON (missing fields keep their defaults)
    #[arg(long)]
    params: Option<String>,

    /// Write the default engine parameters to this file and exit
    #[arg(long)]
    write_params: Option<String>,

    /// Render the metronome clicks to a WAV file
    #[arg(long)]
    click_out: Option<String>,
}

fn open_source(args: &Args) -> Result<Box<dyn FrameSource>> {
    if args.device {
        return open_device();
    }
    match args.wav {
        Some(ref path) => Ok(Box::new(WavSource::open(path)?)),
        None => {
            info!("Using synthetic click track at {} BPM", args.click_bpm);
            Ok(Box::new(ClickTrackSource::new(44100, args.click_bpm)))
        }
    }
}

#[cfg(feature = "device")]
fn open_device() -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(rhythm_coach::audio::DeviceSource::open()?))
}

#[cfg(not(feature = "device"))]
fn open_device() -> Result<Box<dyn FrameSource>> {
    Err(anyhow::anyhow!("Built without the `device` feature"))
}

#[cfg(feature = "device")]
fn open_speaker(tone: &ClickTone) -> Result<Box<dyn ClickSink + Send>> {
    Ok(Box::new(rhythm_coach::coach::SpeakerClicks::open(tone.clone())?))
}

#[cfg(not(feature = "device"))]
fn open_speaker(_tone: &ClickTone) -> Result<Box<dyn ClickSink + Send>> {
    Err(anyhow::anyhow!("Built without the `device` feature"))
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Beat(beat) => {
            log::debug!("[{:>8.1}ms] Boom ({:.3})", beat.timestamp_ms, beat.intensity)
        }
        EngineEvent::Tempo(tempo) => info!("[{:>8.1}ms] {} BPM", tempo.timestamp_ms, tempo.bpm),
        EngineEvent::Prompt(prompt) => info!("[{:>8.1}ms] >> {}", prompt.timestamp_ms, prompt.label),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Some(ref path) = args.write_params {
        EngineParameters::default().save(path)?;
        info!("Default engine parameters written to {}", path);
        return Ok(());
    }

    let params = match args.params {
        Some(ref path) => EngineParameters::load(path)?,
        None => EngineParameters::default(),
    };
    let config = SessionConfig {
        style: args.style,
        metronome_enabled: args.metronome,
    };

    info!("Rhythm coach: {} style, metronome {}", config.style, if config.metronome_enabled { "on" } else { "off" });

    let realtime = args.realtime || args.device;
    let recorder = ClickRecorder::new(params.click.clone());
    let mut click_sinks: Vec<Box<dyn ClickSink + Send>> = Vec::new();
    click_sinks.push(Box::new(recorder.clone()));
    if realtime && config.metronome_enabled {
        match open_speaker(&params.click) {
            Ok(speaker) => click_sinks.push(speaker),
            Err(e) => warn!("Metronome will be silent: {:#}", e),
        }
    }
    let mut controller = SessionController::new(config, params).with_click_sink(Box::new(click_sinks));

    let events = controller.subscribe();
    let printer = std::thread::spawn(move || {
        for event in events.iter() {
            log_event(&event);
        }
    });

    let duration_ms = args.seconds.max(0.0) * 1000.0;
    let source = open_source(&args);
    let sample_rate = source.as_ref().map(|s| s.sample_rate()).unwrap_or(44100);

    if realtime {
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        let stopper = async move {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs_f64(duration_ms / 1000.0)) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
            let _ = stop_tx.send(true);
        };
        let (ticks, _) = tokio::join!(run_session(&mut controller, source, stop_rx), stopper);
        info!("Processed {} analysis frames", ticks);
    } else {
        let mut source = source?;
        let ticks = drive_offline(&mut controller, &mut source, duration_ms);
        info!("Simulated {} analysis frames", ticks);
    }

    let bpm = controller.bpm();
    let beats = controller.beats_detected();
    drop(controller);
    let _ = printer.join();

    if bpm > 0 {
        info!("Detected {} beats, settled at {} BPM", beats, bpm);
    } else {
        info!("No tempo found ({} beats detected)", beats);
    }

    if let Some(ref path) = args.click_out {
        recorder.write_wav(path, sample_rate, duration_ms)?;
    }

    Ok(())
}
