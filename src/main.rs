//! CLI Entry Point for beamline
//!
//! Runs the configured devices against the in-memory soft IOC:
//! - List configured devices
//! - Print where a stage is (`wh`), or cache and resume its positions
//! - Start continuous acquisition on a detector
//! - Run a taxi/fly scan
//!
//! # Usage
//!
//! ```bash
//! beamline --config config/instrument.toml list
//! beamline list --json
//! beamline wh tomostage
//! beamline cont-acq det --exposure 0.1 --period 0.5 --frames 10
//! beamline fly psofly --start -180 --end 180 --slew-speed 5 --scan-delta 0.25
//! ```

use anyhow::{Context, Result};
use beamline_devices::channel::{ChannelValue, SoftIoc};
use beamline_devices::config::InstrumentConfig;
use beamline_devices::hardware::fly::FlyScanSettings;
use beamline_devices::hardware::{DeviceRegistry, Positioner};
use beamline_devices::logging;
use beamline_devices::status::Status;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "beamline")]
#[command(about = "6-ID-D HEDM device control on a simulated IOC", long_about = None)]
struct Cli {
    /// Instrument configuration file
    #[arg(long, default_value = "config/instrument.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured devices
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show name, PV and position of every axis of a stage
    Wh {
        /// Stage name
        stage: String,
    },

    /// Cache a stage's positions, move every axis by an offset, then resume
    CacheResume {
        /// Stage name
        stage: String,

        /// Offset applied to every axis before resuming
        #[arg(long, default_value = "1.0")]
        offset: f64,
    },

    /// Start continuous acquisition on a detector
    ContAcq {
        /// Detector name
        detector: String,

        /// Exposure time per image (seconds)
        #[arg(long)]
        exposure: f64,

        /// Time between image starts (seconds, PointGrey only)
        #[arg(long)]
        period: Option<f64>,

        /// Number of images; 0 or less acquires until stopped
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        frames: i64,
    },

    /// Print every PV of a detector
    Status {
        /// Detector name
        detector: String,
    },

    /// Run a taxi/fly scan
    Fly {
        /// Fly-scan device name
        device: String,

        #[arg(long, allow_hyphen_values = true)]
        start: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        end: Option<f64>,

        #[arg(long)]
        slew_speed: Option<f64>,

        #[arg(long)]
        scan_delta: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = InstrumentConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let ioc = SoftIoc::new();
    let registry = DeviceRegistry::from_config(Arc::new(ioc.clone()), &config)?;
    registry.host_all(&ioc);

    match cli.command {
        Commands::List { json } => list(&registry, json),
        Commands::Wh { stage } => wh(&registry, &stage).await,
        Commands::CacheResume { stage, offset } => cache_resume(&registry, &stage, offset).await,
        Commands::ContAcq {
            detector,
            exposure,
            period,
            frames,
        } => cont_acq(&registry, &ioc, &detector, exposure, period, frames).await,
        Commands::Status { detector } => status(&registry, &detector).await,
        Commands::Fly {
            device,
            start,
            end,
            slew_speed,
            scan_delta,
        } => {
            let settings = match (start, end, slew_speed, scan_delta) {
                (Some(start), Some(end), Some(slew_speed), Some(scan_delta)) => {
                    Some(FlyScanSettings {
                        start,
                        end,
                        slew_speed,
                        scan_delta,
                    })
                }
                (None, None, None, None) => None,
                _ => anyhow::bail!("--start, --end, --slew-speed and --scan-delta go together"),
            };
            fly(&registry, &device, settings).await
        }
    }
}

fn list(registry: &DeviceRegistry, json: bool) -> Result<()> {
    let devices = registry.list_devices();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    for info in devices {
        println!("{}", info);
    }
    Ok(())
}

async fn wh(registry: &DeviceRegistry, stage: &str) -> Result<()> {
    let bundle = registry.bundle(stage)?;
    print!("{}", bundle.wh().await?);
    Ok(())
}

async fn cache_resume(registry: &DeviceRegistry, stage: &str, offset: f64) -> Result<()> {
    let bundle = registry.bundle(stage)?;
    bundle.cache_position().await?;

    let mut moves = Vec::new();
    for (attr, position) in bundle.positions().await? {
        if let Some(positioner) = bundle.positioner(&attr) {
            moves.push(positioner.move_to(position + offset));
        }
    }
    Status::all(moves).wait().await?;
    println!("After offset:");
    print!("{}", bundle.wh().await?);

    bundle.resume_position().await?;
    println!("After resume:");
    print!("{}", bundle.wh().await?);
    Ok(())
}

async fn cont_acq(
    registry: &DeviceRegistry,
    ioc: &SoftIoc,
    detector: &str,
    exposure: f64,
    period: Option<f64>,
    frames: i64,
) -> Result<()> {
    let run_time = acquisition_time(exposure, period, frames)?;
    let handle = registry.detector(detector)?;
    handle.cont_acq(exposure, period, frames).await?;

    if let Some(run_time) = run_time {
        tokio::time::sleep(run_time).await;
        let counter = format!("{}cam1:ArrayCounter_RBV", handle.as_device().prefix());
        let count = ioc.value(&counter).unwrap_or(ChannelValue::Long(0));
        println!("{} images acquired", count);
    }
    Ok(())
}

/// Time a counted acquisition takes, plus a margin; `None` when free-running.
fn acquisition_time(exposure: f64, period: Option<f64>, frames: i64) -> Result<Option<Duration>> {
    anyhow::ensure!(
        exposure.is_finite() && exposure > 0.0,
        "exposure must be a positive number of seconds, got {}",
        exposure
    );
    if let Some(period) = period {
        anyhow::ensure!(
            period.is_finite() && period > 0.0,
            "period must be a positive number of seconds, got {}",
            period
        );
    }
    if frames <= 0 {
        return Ok(None);
    }

    let per_frame = period.unwrap_or(exposure).max(exposure);
    let run_time = Duration::try_from_secs_f64(per_frame * frames as f64 + 0.1)
        .with_context(|| format!("{} frames of {} s do not fit a duration", frames, per_frame))?;
    Ok(Some(run_time))
}

async fn status(registry: &DeviceRegistry, detector: &str) -> Result<()> {
    let handle = registry.detector(detector)?;
    println!("{}", handle.help());
    for reading in handle.status().await? {
        println!("{:<40} {:<40} {}", reading.name, reading.pv, reading.reading.value);
    }
    Ok(())
}

async fn fly(registry: &DeviceRegistry, device: &str, settings: Option<FlyScanSettings>) -> Result<()> {
    let handle = registry.fly_device(device)?;
    if let Some(settings) = settings {
        handle.configure(settings).await?;
    }
    handle.plan().await?;
    println!("Fly scan '{}' complete", device);
    Ok(())
}
