//! Detectors of the 6-ID-D station.
//!
//! | Detector            | Blocks                                    | Use                 |
//! |---------------------|-------------------------------------------|---------------------|
//! | [`GeDetector`]      | cam1, proc1, tiff1                        | legacy GE panels    |
//! | [`Varex4343ct`]     | cam1, proc1, tiff1, hdf1, trans1, image1  | ff-HEDM             |
//! | [`PointGreyDetector`] | cam1, proc1, tiff1, hdf1, trans1, image1 | tomo and nf-HEDM    |
//! | [`SimDetector`]     | cam1, proc1, tiff1, hdf1                  | simulation IOC      |

use super::{
    continuous_acquisition, AreaDetector, CamBase, DetectorEnhancements, Hdf5Plugin, ImageMode,
    ImagePlugin, PointGreyCam, ProcessPlugin, SimDetectorCam, TiffPlugin, TransformPlugin,
    VarexCam, DEFAULT_SETTLE_DELAY,
};
use crate::channel::ChannelAccess;
use crate::device::{nest, Component, Device, SignalEntry};
use crate::error::AppResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn block(prefix: &str, suffix: &str) -> String {
    format!("{}{}", prefix, suffix)
}

// =============================================================================
// GE
// =============================================================================

/// Generic GE detector.
#[derive(Debug)]
pub struct GeDetector {
    name: String,
    prefix: String,
    pub cam1: CamBase,
    pub proc1: ProcessPlugin,
    pub tiff1: TiffPlugin,
    staged: Mutex<Option<ImageMode>>,
}

impl GeDetector {
    /// e.g. `GeDetector::new(client, "GE2:", "det")`
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.to_string(),
            cam1: CamBase::new(client.clone(), &block(prefix, "cam1:")),
            proc1: ProcessPlugin::new(client.clone(), &block(prefix, "Proc1:")),
            tiff1: TiffPlugin::new(client, &block(prefix, "TIFF1:")),
            staged: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Device for GeDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn component_names(&self) -> Vec<&str> {
        vec!["cam1", "proc1", "tiff1"]
    }

    fn walk_signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = nest("cam1", self.cam1.signals());
        entries.extend(nest("proc1", self.proc1.signals()));
        entries.extend(nest("tiff1", self.tiff1.signals()));
        entries
    }
}

impl AreaDetector for GeDetector {
    fn cam(&self) -> &CamBase {
        &self.cam1
    }

    fn staged_mode(&self) -> &Mutex<Option<ImageMode>> {
        &self.staged
    }
}

// =============================================================================
// Varex 4343CT
// =============================================================================

/// Varex 4343CT flat panel used for ff-HEDM.
#[derive(Debug)]
pub struct Varex4343ct {
    name: String,
    prefix: String,
    pub cam1: VarexCam,
    pub proc1: ProcessPlugin,
    pub tiff1: TiffPlugin,
    pub hdf1: Hdf5Plugin,
    pub trans1: TransformPlugin,
    pub image1: ImagePlugin,
    settle_delay: Duration,
    staged: Mutex<Option<ImageMode>>,
}

impl Varex4343ct {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.to_string(),
            cam1: VarexCam::new(client.clone(), &block(prefix, "cam1:")),
            proc1: ProcessPlugin::new(client.clone(), &block(prefix, "Proc1:")),
            tiff1: TiffPlugin::new(client.clone(), &block(prefix, "TIFF1:")),
            hdf1: Hdf5Plugin::new(client.clone(), &block(prefix, "HDF1:")),
            trans1: TransformPlugin::with_type(client.clone(), &block(prefix, "Trans1:")),
            image1: ImagePlugin::new(client, &block(prefix, "image1:")),
            settle_delay: DEFAULT_SETTLE_DELAY,
            staged: Mutex::new(None),
        }
    }

    /// Override the pause before `Acquire` is written by `cont_acq`.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Start acquiring `frames` images of `exposure` seconds each.
    ///
    /// `frames <= 0` acquires until stopped at the IOC.
    pub async fn cont_acq(&self, exposure: f64, frames: i64) -> AppResult<()> {
        continuous_acquisition(&self.cam1.base, exposure, None, frames, self.settle_delay).await
    }
}

#[async_trait]
impl Device for Varex4343ct {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn component_names(&self) -> Vec<&str> {
        vec!["cam1", "proc1", "tiff1", "hdf1", "trans1", "image1"]
    }

    fn walk_signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = nest("cam1", self.cam1.signals());
        entries.extend(nest("proc1", self.proc1.signals()));
        entries.extend(nest("tiff1", self.tiff1.signals()));
        entries.extend(nest("hdf1", self.hdf1.signals()));
        entries.extend(nest("trans1", self.trans1.signals()));
        entries.extend(nest("image1", self.image1.signals()));
        entries
    }
}

impl AreaDetector for Varex4343ct {
    fn cam(&self) -> &CamBase {
        &self.cam1.base
    }

    fn staged_mode(&self) -> &Mutex<Option<ImageMode>> {
        &self.staged
    }
}

impl DetectorEnhancements for Varex4343ct {
    fn model(&self) -> &'static str {
        "Varex 4343CT"
    }
}

// =============================================================================
// PointGrey
// =============================================================================

/// PointGrey Grasshopper3 used for tomography and nf-HEDM.
#[derive(Debug)]
pub struct PointGreyDetector {
    name: String,
    prefix: String,
    pub cam1: PointGreyCam,
    pub proc1: ProcessPlugin,
    pub tiff1: TiffPlugin,
    pub hdf1: Hdf5Plugin,
    pub trans1: TransformPlugin,
    pub image1: ImagePlugin,
    settle_delay: Duration,
    staged: Mutex<Option<ImageMode>>,
}

impl PointGreyDetector {
    /// e.g. `PointGreyDetector::new(client, "1idPG4:", "det")`
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.to_string(),
            cam1: PointGreyCam::new(client.clone(), &block(prefix, "cam1:")),
            proc1: ProcessPlugin::new(client.clone(), &block(prefix, "Proc1:")),
            tiff1: TiffPlugin::new(client.clone(), &block(prefix, "TIFF1:")),
            hdf1: Hdf5Plugin::new(client.clone(), &block(prefix, "HDF1:")),
            trans1: TransformPlugin::new(client.clone(), &block(prefix, "Trans1:")),
            image1: ImagePlugin::new(client, &block(prefix, "image1:")),
            settle_delay: DEFAULT_SETTLE_DELAY,
            staged: Mutex::new(None),
        }
    }

    /// Override the pause before `Acquire` is written by `cont_acq`.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Start acquiring `frames` images of `exposure` seconds, one every
    /// `period` seconds.
    ///
    /// `frames <= 0` acquires until stopped at the IOC.
    pub async fn cont_acq(&self, exposure: f64, period: f64, frames: i64) -> AppResult<()> {
        continuous_acquisition(
            &self.cam1.base,
            exposure,
            Some(period),
            frames,
            self.settle_delay,
        )
        .await
    }
}

#[async_trait]
impl Device for PointGreyDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn component_names(&self) -> Vec<&str> {
        vec!["cam1", "proc1", "tiff1", "hdf1", "trans1", "image1"]
    }

    fn walk_signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = nest("cam1", self.cam1.signals());
        entries.extend(nest("proc1", self.proc1.signals()));
        entries.extend(nest("tiff1", self.tiff1.signals()));
        entries.extend(nest("hdf1", self.hdf1.signals()));
        entries.extend(nest("trans1", self.trans1.signals()));
        entries.extend(nest("image1", self.image1.signals()));
        entries
    }
}

impl AreaDetector for PointGreyDetector {
    fn cam(&self) -> &CamBase {
        &self.cam1.base
    }

    fn staged_mode(&self) -> &Mutex<Option<ImageMode>> {
        &self.staged
    }
}

impl DetectorEnhancements for PointGreyDetector {
    fn model(&self) -> &'static str {
        "PointGrey Grasshopper3"
    }
}

// =============================================================================
// Simulation
// =============================================================================

/// areaDetector simulation IOC, driven like a PointGrey.
#[derive(Debug)]
pub struct SimDetector {
    name: String,
    prefix: String,
    pub cam1: SimDetectorCam,
    pub proc1: ProcessPlugin,
    pub tiff1: TiffPlugin,
    pub hdf1: Hdf5Plugin,
    staged: Mutex<Option<ImageMode>>,
}

impl SimDetector {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.to_string(),
            cam1: SimDetectorCam::new(client.clone(), &block(prefix, "cam1:")),
            proc1: ProcessPlugin::new(client.clone(), &block(prefix, "Proc1:")),
            tiff1: TiffPlugin::new(client.clone(), &block(prefix, "TIFF1:")),
            hdf1: Hdf5Plugin::new(client, &block(prefix, "HDF1:")),
            staged: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Device for SimDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn component_names(&self) -> Vec<&str> {
        vec!["cam1", "proc1", "tiff1", "hdf1"]
    }

    fn walk_signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = nest("cam1", self.cam1.signals());
        entries.extend(nest("proc1", self.proc1.signals()));
        entries.extend(nest("tiff1", self.tiff1.signals()));
        entries.extend(nest("hdf1", self.hdf1.signals()));
        entries
    }
}

impl AreaDetector for SimDetector {
    fn cam(&self) -> &CamBase {
        &self.cam1.base
    }

    fn staged_mode(&self) -> &Mutex<Option<ImageMode>> {
        &self.staged
    }
}

impl DetectorEnhancements for SimDetector {
    fn model(&self) -> &'static str {
        "areaDetector simulation"
    }
}
