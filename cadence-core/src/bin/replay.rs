//! Replay a WAV file through the engine and print events as JSON lines.
//!
//! ```text
//! cadence-replay <file.wav> [--frame-ms <n>] [--config <cfg.json>] [--pause-ms <n>]
//! ```
//!
//! Timestamps are synthetic, derived from sample position, so a replay is
//! fully deterministic.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cadence_core::{
    ipc::events::VadEvent, source::QueuedFrames, Frame, FrameSource, VadConfig, VadEngine,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug)]
struct Args {
    input: PathBuf,
    frame_ms: u64,
    config: Option<PathBuf>,
    pause_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    file: String,
    sample_rate: u32,
    duration_ms: u64,
    frames: usize,
    speech_starts: usize,
    pauses: usize,
    final_segment_count: u64,
    final_noise_floor: f32,
}

fn parse_args() -> Result<Args> {
    let mut input: Option<PathBuf> = None;
    let mut frame_ms: u64 = 50;
    let mut config: Option<PathBuf> = None;
    let mut pause_ms: Option<u64> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--frame-ms" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --frame-ms");
                };
                frame_ms = v.parse().context("invalid value for --frame-ms")?;
                if frame_ms == 0 {
                    bail!("--frame-ms must be > 0");
                }
            }
            "--config" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --config");
                };
                config = Some(PathBuf::from(v));
            }
            "--pause-ms" => {
                let Some(v) = it.next() else {
                    bail!("missing value for --pause-ms");
                };
                pause_ms = Some(v.parse().context("invalid value for --pause-ms")?);
            }
            "--help" | "-h" => {
                println!(
                    "Usage: cadence-replay <file.wav> [--frame-ms <n>] [--config <cfg.json>] [--pause-ms <n>]"
                );
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown argument: {other}"),
            other => input = Some(PathBuf::from(other)),
        }
    }

    let Some(input) = input else {
        bail!("missing input WAV file (see --help)");
    };
    Ok(Args {
        input,
        frame_ms,
        config,
        pause_ms,
    })
}

/// Decode a WAV file into mono f32 samples in [-1, 1].
fn read_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = interleaved
        .chunks_exact(channels)
        .map(|group| group.iter().sum::<f32>() / channels as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence=info".into()),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("replay failed: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args()?;

    let mut config = match &args.config {
        Some(path) => VadConfig::from_path(path)?,
        None => VadConfig::default(),
    };
    if let Some(pause_ms) = args.pause_ms {
        config.pause_duration_ms = pause_ms;
    }
    // Synthetic clock: every frame is one analysis step.
    config.analysis_interval_ms = config.analysis_interval_ms.min(args.frame_ms);
    config.validate()?;

    let (samples, sample_rate) = read_mono(&args.input)?;
    let frame_len = ((sample_rate as u64 * args.frame_ms) / 1000).max(1) as usize;
    let mut frames: QueuedFrames = samples
        .chunks_exact(frame_len)
        .map(|chunk| Frame::new(chunk.to_vec(), sample_rate))
        .collect();
    let frame_count = frames.len();
    info!(
        file = %args.input.display(),
        sample_rate,
        frame_len,
        frames = frame_count,
        "replaying"
    );

    let (tx, rx) = crossbeam_channel::unbounded::<VadEvent>();
    let mut engine = VadEngine::start(config, tx)?;

    let mut speech_starts = 0;
    let mut pauses = 0;
    let mut now_ms = 0u64;
    while let Some(frame) = frames.next_frame() {
        engine.tick(&frame, now_ms)?;
        for event in rx.try_iter() {
            match &event {
                VadEvent::EnergyUpdate(_) => continue,
                VadEvent::SpeechStart(_) => speech_starts += 1,
                VadEvent::PauseDetected(_) => pauses += 1,
            }
            println!("{}", event.to_json_line()?);
        }
        now_ms += args.frame_ms;
    }

    let snapshot = engine.state();
    engine.stop();

    let summary = Summary {
        file: args.input.display().to_string(),
        sample_rate,
        duration_ms: now_ms,
        frames: frame_count,
        speech_starts,
        pauses,
        final_segment_count: snapshot.segment_count,
        final_noise_floor: snapshot.noise_floor,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
