//! perchbox apparatus (perchbox-ap) - main entry point
//!
//! Startup order: configuration -> diagnostics -> sensor port -> run
//! command -> transition log -> stimulus libraries -> audio device -> run.
//! Any startup failure exits before the decision loop starts, with a status
//! naming the failing resource.

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use perchbox_ap::audio::{self, CpalSink};
use perchbox_ap::library::{StimulusLibraries, StimulusLibrary};
use perchbox_ap::logger::TransitionLogger;
use perchbox_ap::playback::{PlaybackController, PlaybackSettings};
use perchbox_ap::sensor::{spawn_sensor, SerialSensor};
use perchbox_ap::state::{CategoryAssignment, StateLabels};
use perchbox_ap::{Apparatus, ApparatusSettings};
use perchbox_common::config::{ConfigResolver, LoggingConfig, TomlConfig};
use perchbox_common::time::millis_to_duration;
use perchbox_common::RunCommand;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for perchbox-ap
#[derive(Parser, Debug)]
#[command(name = "perchbox-ap")]
#[command(about = "Perch-preference apparatus controller")]
#[command(version)]
struct Args {
    /// Config file (overrides PERCHBOX_CONFIG and the user config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run command `Bird_Trial_SETTING`, e.g. `Woody_02_ASB` (prompted if absent)
    #[arg(short, long)]
    run: Option<String>,

    /// Sensor serial port
    #[arg(short, long, env = "PERCHBOX_PORT")]
    port: Option<String>,

    /// Dwell threshold before playback starts, in milliseconds
    #[arg(long)]
    threshold_ms: Option<u64>,

    /// Folder receiving the transition log
    #[arg(long)]
    log_folder: Option<PathBuf>,

    /// Audio output device name
    #[arg(long)]
    audio_device: Option<String>,

    /// Print audio output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("perchbox-ap: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Exit status for a startup failure
fn exit_code(e: &anyhow::Error) -> u8 {
    if let Some(e) = e.downcast_ref::<perchbox_ap::Error>() {
        return e.exit_code();
    }
    if e.downcast_ref::<perchbox_common::Error>().is_some() {
        return 2;
    }
    1
}

async fn run(args: Args) -> Result<()> {
    let resolved = ConfigResolver::new(args.config.clone()).resolve();
    let logging = resolved
        .as_ref()
        .map(|(config, _)| config.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging)?;

    info!(
        "Starting perchbox-ap v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let (mut config, source) = resolved.context("Failed to load configuration")?;
    info!("Configuration source: {:?}", source);

    if args.list_devices {
        for name in audio::list_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    apply_overrides(&mut config, &args);
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    let sensor = SerialSensor::open(&config.sensor)?;

    let run_command = match args.run.as_deref() {
        Some(raw) => raw
            .parse::<RunCommand>()
            .with_context(|| format!("Invalid run command '{}'", raw))?,
        None => tokio::task::spawn_blocking(prompt_run_command)
            .await
            .context("Run command prompt failed")??,
    };
    info!(
        "Run {}: subject {}, trial {}, setting {}",
        run_command.as_str(),
        run_command.subject(),
        run_command.trial(),
        run_command.setting()
    );
    let assignment = CategoryAssignment::from_setting(run_command.setting());
    let labels = StateLabels::new(
        config.stimulus.a_label.trim(),
        config.stimulus.b_label.trim(),
    );

    let logger = TransitionLogger::open_file(
        &config.log_folder_path(),
        &run_command,
        labels,
        perchbox_common::time::now(),
    )?;

    let expected = config.stimulus.expected_tracks;
    let libraries = StimulusLibraries::new(
        StimulusLibrary::from_folder(
            &config.a_folder_path(),
            expected,
            StimulusLibrary::entropy_rng(),
        )?,
        StimulusLibrary::from_folder(
            &config.b_folder_path(),
            expected,
            StimulusLibrary::entropy_rng(),
        )?,
    );

    let playback_settings = PlaybackSettings {
        fade_out: millis_to_duration(config.timing.fade_out_ms),
        poll_interval: millis_to_duration(config.timing.playback_poll_ms),
        interrupt_timeout: millis_to_duration(config.timing.interrupt_timeout_ms),
    };
    let device = config.audio_device.clone();
    let curve = config.timing.fade_curve;
    info!(
        "Interrupt fade-out: {} ms, {} curve",
        config.timing.fade_out_ms, curve
    );
    let (playback, events) = PlaybackController::spawn(
        move || CpalSink::open(device.as_deref(), curve),
        libraries,
        playback_settings,
    )?;

    let (sensor, readings) = spawn_sensor(sensor)?;
    let settings = ApparatusSettings {
        threshold: millis_to_duration(config.timing.threshold_ms),
        loop_tick: millis_to_duration(config.timing.loop_tick_ms),
        keep_records: false,
    };

    let apparatus = Apparatus::new(
        sensor,
        readings,
        assignment,
        playback,
        events,
        logger,
        settings,
    );
    let summary = apparatus.run(shutdown_signal()).await;

    println!(
        "Run {} finished: {} intervals logged, {} tracks played",
        run_command.as_str(),
        summary.records_written,
        summary.tracks_started
    );
    Ok(())
}

fn apply_overrides(config: &mut TomlConfig, args: &Args) {
    if let Some(port) = &args.port {
        config.sensor.port = port.clone();
    }
    if let Some(threshold) = args.threshold_ms {
        config.timing.threshold_ms = threshold;
    }
    if let Some(folder) = &args.log_folder {
        config.log_folder = folder.clone();
    }
    if let Some(device) = &args.audio_device {
        config.audio_device = Some(device.clone());
    }
}

/// Ask the operator for a run command until a valid one is entered
fn prompt_run_command() -> Result<RunCommand> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Run command (Bird_Trial_SETTING, e.g. Woody_02_ASB): ");
        io::stdout().flush()?;

        let line = lines
            .next()
            .ok_or_else(|| anyhow!("standard input closed before a run command was entered"))??;
        match line.trim().parse::<RunCommand>() {
            Ok(run) => return Ok(run),
            Err(e) => {
                warn!("Rejected run command '{}': {}", line.trim(), e);
                println!("{}", e);
            }
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Completes on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
