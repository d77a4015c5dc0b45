//! areaDetector support for the 6-ID-D cameras.
//!
//! A detector is a set of blocks under one IOC prefix: a camera (`cam1:`)
//! and plugins (`Proc1:`, `TIFF1:`, `HDF1:`, ...). Detectors used in scans
//! follow the single-trigger strategy:
//!
//! - `stage()` remembers the image mode and switches to `Single`
//! - `trigger()` writes `Acquire = 1` and completes when the frame is done
//! - `unstage()` restores the remembered image mode
//!
//! For interactive use the PointGrey and Varex detectors also offer
//! `cont_acq`, which leaves the camera acquiring (counted or free-running)
//! and returns immediately.

pub mod cam;
pub mod detectors;
pub mod plugins;

pub use cam::{CamBase, PointGreyCam, SimDetectorCam, VarexCam};
pub use detectors::{GeDetector, PointGreyDetector, SimDetector, Varex4343ct};
pub use plugins::{
    FilePlugin, Hdf5Plugin, ImagePlugin, PluginBase, ProcessPlugin, TiffPlugin, TransformPlugin,
};

use crate::device::{Device, SignalReading};
use crate::error::{AppResult, DeviceError};
use crate::hardware::capabilities::{Stageable, Triggerable};
use crate::signal::ReadSignal;
use crate::status::Status;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// State names of the `ImageMode` record.
pub const IMAGE_MODES: &[&str] = &["Single", "Multiple", "Continuous"];

/// Pause between writing camera settings and starting acquisition.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Camera image mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    /// One frame per acquire
    Single,
    /// `NumImages` frames per acquire
    Multiple,
    /// Until stopped
    Continuous,
}

impl ImageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMode::Single => "Single",
            ImageMode::Multiple => "Multiple",
            ImageMode::Continuous => "Continuous",
        }
    }
}

impl fmt::Display for ImageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Single" | "0" => Ok(ImageMode::Single),
            "Multiple" | "1" => Ok(ImageMode::Multiple),
            "Continuous" | "2" => Ok(ImageMode::Continuous),
            other => Err(format!("Unknown image mode: {}", other)),
        }
    }
}

/// A detector with a camera block.
///
/// Implementors get [`Stageable`] and [`Triggerable`] with the single-trigger
/// behavior.
pub trait AreaDetector: Device {
    fn cam(&self) -> &CamBase;

    /// Image mode saved by `stage`, restored by `unstage`.
    fn staged_mode(&self) -> &Mutex<Option<ImageMode>>;
}

#[async_trait]
impl<T: AreaDetector> Stageable for T {
    async fn stage(&self) -> AppResult<()> {
        let cam = self.cam();
        let current = cam.image_mode.get().await?.to_string();
        let current = current
            .parse::<ImageMode>()
            .map_err(|e| DeviceError::channel(cam.image_mode.pvname(), e))?;

        cam.image_mode.put(ImageMode::Single.as_str()).await?;
        *self.staged_mode().lock() = Some(current);
        tracing::debug!(detector = %self.name(), saved = %current, "staged");
        Ok(())
    }

    async fn unstage(&self) -> AppResult<()> {
        let saved = self.staged_mode().lock().take();
        if let Some(mode) = saved {
            self.cam().image_mode.put(mode.as_str()).await?;
            tracing::debug!(detector = %self.name(), restored = %mode, "unstaged");
        }
        Ok(())
    }

    fn is_staged(&self) -> bool {
        self.staged_mode().lock().is_some()
    }
}

impl<T: AreaDetector> Triggerable for T {
    fn trigger(&self) -> Status {
        tracing::debug!(detector = %self.name(), "trigger");
        self.cam().acquire.set(1_i64)
    }
}

/// Interactive helpers shared by the detectors used at the station.
#[async_trait]
pub trait DetectorEnhancements: Device {
    /// Human-readable model name.
    fn model(&self) -> &'static str;

    /// Every PV of the detector with its current value.
    async fn status(&self) -> AppResult<Vec<SignalReading>> {
        let mut readings = Vec::new();
        for entry in self.walk_signals() {
            readings.push(SignalReading {
                pv: entry.signal.pvname().to_string(),
                reading: entry.signal.read().await?,
                name: entry.name,
            });
        }
        Ok(readings)
    }

    /// One-line summary of the detector.
    fn help(&self) -> String {
        format!(
            "{} '{}' at {} ({})",
            self.model(),
            self.name(),
            self.prefix(),
            self.component_names().join(", ")
        )
    }
}

/// Start free-running or counted acquisition and return without waiting.
///
/// `frames > 0` acquires exactly that many images; anything else runs until
/// stopped from the IOC.
pub(crate) async fn continuous_acquisition(
    cam: &CamBase,
    exposure: f64,
    period: Option<f64>,
    frames: i64,
    settle_delay: Duration,
) -> AppResult<()> {
    cam.acquire_time.put(exposure).await?;
    if let Some(period) = period {
        cam.acquire_period.put(period).await?;
    }

    if frames > 0 {
        cam.image_mode.put(ImageMode::Multiple.as_str()).await?;
        cam.num_images.put(frames).await?;
        tracing::info!(
            "Start taking {} images with {} seconds of exposure",
            frames,
            exposure
        );
    } else {
        cam.image_mode.put(ImageMode::Continuous.as_str()).await?;
        tracing::info!("Start taking images with {} seconds of exposure", exposure);
    }
    tracing::info!("Press \"Stop\" on {} to stop acquisition", cam.prefix());

    tokio::time::sleep(settle_delay).await;
    cam.acquire.put(1_i64).await
}
