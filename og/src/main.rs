//! objectgesture - object and gesture tracking coordinator
//!
//! CLI entry point wiring one coordinator to the in-process device.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use objectgesture::cli::{Cli, Command, OutputFormat};
use objectgesture::config::Config;
use objectgesture::coordinator::{Detection, DeviceCoordinator, KindDetection, UnloadReport};
use objectgesture::device::{LocalDevice, dataset, validate_keypoints};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("objectgesture")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("objectgesture.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(coordinator = %config.coordinator.name, "objectgesture loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            dataset,
            kind,
            camera,
            duration_secs,
            format,
        } => {
            debug!(?dataset, %kind, camera, ?duration_secs, "main: matched Run command");
            cmd_run(&config, &dataset, &kind, camera, duration_secs, format).await
        }
        Command::Gestures => {
            debug!("main: matched Gestures command");
            cmd_gestures(&config)
        }
        Command::Check { path } => {
            debug!(?path, "main: matched Check command");
            cmd_check(&path)
        }
        Command::Config => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
    }
}

async fn cmd_run(
    config: &Config,
    dataset: &Path,
    kind: &str,
    camera: i32,
    duration_secs: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    debug!("cmd_run: called");
    let device = LocalDevice::spawn(config.device.clone());
    let broker = device.broker("og");
    let coordinator = DeviceCoordinator::initialize(&broker, config.coordinator.clone())
        .await
        .context("Failed to initialize coordinator")?;

    let session = track(&coordinator, dataset, kind, camera, duration_secs, format).await;
    let report = coordinator.unload().await.context("Failed to unload coordinator")?;
    print_report(&report);
    session
}

async fn track(
    coordinator: &DeviceCoordinator,
    dataset: &Path,
    kind: &str,
    camera: i32,
    duration_secs: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let mut detections = coordinator.subscribe_detections();
    let index = coordinator
        .load_dataset(dataset, kind)
        .await
        .context(format!("Failed to load dataset {}", dataset.display()))?;
    coordinator
        .start_tracking(camera)
        .await
        .context("Failed to start tracking")?;
    println!(
        "{} Tracking {} (index {}) on camera {}",
        "✓".green(),
        kind.cyan(),
        index,
        camera
    );

    let deadline = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
            }
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                debug!("track: deadline reached");
                break;
            }
            received = detections.recv() => match received {
                Ok(found) => print_detection(&found, format)?,
                Err(RecvError::Lagged(skipped)) => warn!(%skipped, "Detection output lagging"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    coordinator.stop_tracking().await.context("Failed to stop tracking")?;
    Ok(())
}

fn print_detection(found: &KindDetection, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(found).context("Failed to encode detection")?);
        }
        OutputFormat::Text => {
            let label = found.detection.label_text().unwrap_or_else(|| "-".to_string());
            match &found.detection {
                Detection::Lost => println!("{} {}", found.kind.cyan(), "lost".red()),
                Detection::Brief { .. } => println!("{} {}", found.kind.cyan(), label.yellow()),
                Detection::Full { object_id, centroid, .. } => {
                    let id = object_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
                    let at = centroid
                        .map(|(x, y)| format!("({:.1}, {:.1})", x, y))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{} {} id={} at {}",
                        found.kind.cyan(),
                        label.yellow(),
                        id,
                        at.dimmed()
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_report(report: &UnloadReport) {
    let mark = if report.is_clean() { "✓".green() } else { "!".yellow() };
    println!(
        "{} Unloaded: {} kinds, {} gestures removed",
        mark, report.kinds_removed, report.gestures_removed
    );
    for failure in &report.failures {
        println!("  {} {}", "✗".red(), failure);
    }
}

fn cmd_gestures(config: &Config) -> Result<()> {
    debug!("cmd_gestures: called");
    if config.coordinator.gestures.is_empty() {
        println!("No gestures configured");
        return Ok(());
    }
    for gesture in &config.coordinator.gestures {
        let keypoints = format!("{:?}", gesture.keypoints);
        match validate_keypoints(&gesture.keypoints) {
            Ok(()) => println!("{} {}", gesture.name.cyan(), keypoints),
            Err(reason) => println!("{} {} {}", gesture.name.cyan(), keypoints, reason.red()),
        }
    }
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    debug!(?path, "cmd_check: called");
    let scan = dataset::scan(path).context(format!("Invalid dataset {}", path.display()))?;
    println!(
        "{} {} image/mask pairs in {}",
        "✓".green(),
        scan.len(),
        scan.root.display().to_string().cyan()
    );
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
