use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
#[cfg(feature = "capture")]
use std::time::{Duration, Instant};

#[cfg(not(feature = "capture"))]
use anyhow::bail;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pitch_tracker::analysis::{
    default_loader, map_bin, ModelLoader, PitchWorker, ResultPublisher, WorkerSettings,
    CREPE_BIN_COUNT,
};
use pitch_tracker::audio::wav::read_wav;
use pitch_tracker::audio::{IngestPort, RingAccumulator};
use pitch_tracker::config::AppConfig;
use pitch_tracker::telemetry;
use pitch_tracker::testing::{StubLoader, STUB_MODEL_BLOB};
use serde::Serialize;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pitch_cli", about = "Offline and live harness for the pitch detector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream a WAV file through the detection pipeline and print readings
    Analyze(AnalyzeArgs),
    /// Print the frequency of a model output bin
    Map {
        #[arg(long)]
        bin: usize,
        /// Number of bins the model produces
        #[arg(long, default_value_t = CREPE_BIN_COUNT)]
        bin_count: usize,
    },
    /// Detect pitch from the default input device (requires capture feature)
    Listen(ListenArgs),
    /// Analyze a WAV file and print the telemetry snapshot instead of readings
    Telemetry(AnalyzeArgs),
}

#[derive(Args, Debug, Clone)]
struct ModelArgs {
    /// Serialized model blob to load
    #[arg(long, conflicts_with = "stub_bin")]
    model: Option<PathBuf>,
    /// Use the scripted stub engine, always answering this bin
    #[arg(long)]
    stub_bin: Option<usize>,
    /// JSON configuration file (defaults to assets/pitch_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct AnalyzeArgs {
    /// WAV file to analyze
    #[arg(long)]
    wav: PathBuf,
    /// Frames per block handed to the ingest port
    #[arg(long, default_value_t = 512)]
    block_size: usize,
    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args, Debug, Clone)]
struct ListenArgs {
    /// How long to listen (seconds)
    #[arg(long, default_value_t = 10)]
    seconds: u64,
    /// Reading print interval (milliseconds)
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,
    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Debug, Serialize)]
struct TimedReading {
    block: usize,
    time_s: f64,
    frequency_hz: f32,
    confidence: f32,
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    wav: String,
    sample_rate: u32,
    channels: usize,
    frames: usize,
    frame_size: usize,
    blocks: usize,
    inference_frames: usize,
    overflows: u64,
    readings: Vec<TimedReading>,
}

#[derive(Debug, Serialize)]
struct BinMapping {
    bin: usize,
    frequency_hz: f32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze(args) => {
            let report = analyze(&args)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Map { bin, bin_count } => {
            let frequency_hz = map_bin(bin, bin_count)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&BinMapping { bin, frequency_hz })?
            );
        }
        Commands::Listen(args) => listen_command(args)?,
        Commands::Telemetry(args) => {
            analyze(&args)?;
            println!("{}", serde_json::to_string_pretty(&telemetry::hub().snapshot())?);
        }
    }
    Ok(())
}

fn load_config(args: &ModelArgs) -> AppConfig {
    let config = match &args.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    telemetry::install(&config.telemetry);
    config
}

/// Loader and blob selected by `--model` / `--stub-bin`
fn resolve_model(args: &ModelArgs) -> Result<(Box<dyn ModelLoader>, Vec<u8>)> {
    if let Some(bin) = args.stub_bin {
        return Ok((Box::new(StubLoader::new(bin)), STUB_MODEL_BLOB.to_vec()));
    }
    let path = args
        .model
        .as_deref()
        .context("Provide a model via --model or use --stub-bin")?;
    let blob = fs::read(path).with_context(|| format!("reading model {}", path.display()))?;
    Ok((default_loader(), blob))
}

/// Replay a WAV file block by block, draining after every block
///
/// Runs the worker cycle inline so the output is deterministic. Blocks
/// larger than the accumulator are rejected, so no block overflows.
fn analyze(args: &AnalyzeArgs) -> Result<AnalysisReport> {
    anyhow::ensure!(args.block_size > 0, "--block-size must be greater than zero");

    let config = load_config(&args.model);
    config.detector.validate()?;
    anyhow::ensure!(
        args.block_size <= config.detector.accumulator_capacity,
        "--block-size {} exceeds accumulator_capacity {}",
        args.block_size,
        config.detector.accumulator_capacity
    );
    let (loader, blob) = resolve_model(&args.model)?;
    let model = loader
        .load(&blob, config.detector.frame_size)
        .context("loading model")?;

    let clip = read_wav(&args.wav)?;
    tracing::info!(
        "[pitch_cli] Analyzing {} ({} Hz, {} channels, {} frames)",
        args.wav.display(),
        clip.sample_rate,
        clip.channels.len(),
        clip.frames()
    );

    let accumulator = Arc::new(RingAccumulator::new(
        config.detector.accumulator_capacity,
    ));
    let port = IngestPort::new(Arc::clone(&accumulator));
    let publisher = Arc::new(ResultPublisher::new());
    let mut worker = PitchWorker::new(
        Arc::clone(&accumulator),
        Arc::clone(&publisher),
        Some(model),
        WorkerSettings {
            frame_size: config.detector.frame_size,
            poll_interval: std::time::Duration::from_millis(config.detector.poll_interval_ms),
            occupancy_every_n_drains: config.telemetry.occupancy_every_n_drains,
        },
    );

    let mut readings = Vec::new();
    let mut inference_frames = 0;
    let mut blocks = 0;
    let mut start = 0;
    while start < clip.frames() {
        let block = clip.block(start, args.block_size);
        port.ingest_planar(&block);
        start += args.block_size;

        let report = worker.run_once();
        inference_frames += report.frames;
        if report.published > 0 {
            let reading = publisher.read();
            readings.push(TimedReading {
                block: blocks,
                time_s: start.min(clip.frames()) as f64 / clip.sample_rate as f64,
                frequency_hz: reading.frequency_hz,
                confidence: reading.confidence,
            });
        }
        blocks += 1;
    }

    Ok(AnalysisReport {
        wav: display_name(&args.wav),
        sample_rate: clip.sample_rate,
        channels: clip.channels.len(),
        frames: clip.frames(),
        frame_size: config.detector.frame_size,
        blocks,
        inference_frames,
        overflows: accumulator.overflow_count(),
        readings,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

fn listen_command(args: ListenArgs) -> Result<()> {
    #[cfg(feature = "capture")]
    {
        return listen_impl(args);
    }

    #[cfg(not(feature = "capture"))]
    {
        let _ = args;
        bail!("pitch_cli listen requires the capture feature");
    }
}

#[cfg(feature = "capture")]
fn listen_impl(args: ListenArgs) -> Result<()> {
    use pitch_tracker::audio::CaptureStream;
    use pitch_tracker::PitchDetector;

    let config = load_config(&args.model);
    let (loader, blob) = resolve_model(&args.model)?;
    let stop_timeout = Duration::from_millis(config.detector.stop_timeout_ms);

    let detector = PitchDetector::with_loader(config, loader)?;
    detector.try_initialize(&blob)?;
    detector.start()?;
    let stream = CaptureStream::open_default(detector.ingest_port())?;
    eprintln!(
        "Listening at {} Hz, {} channels for {}s",
        stream.sample_rate(),
        stream.channels(),
        args.seconds
    );

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut last_seen = detector.publish_count();
    while Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(args.interval_ms.max(1)));
        let count = detector.publish_count();
        if count != last_seen {
            last_seen = count;
            println!("{}", serde_json::to_string(&detector.current_reading())?);
        }
    }

    drop(stream);
    detector.stop(stop_timeout)?;
    Ok(())
}
