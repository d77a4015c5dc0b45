//! Device Registry
//!
//! Central registry that instantiates the devices of one instrument from its
//! configuration and hands them out by name:
//!
//! - **Bundles**: motor stages, returned as [`MotorBundle`] for caching,
//!   resuming and `wh()` summaries
//! - **Detectors**: area detectors, returned as a [`DetectorHandle`]
//! - **Fly devices**: taxi/fly scan controllers, returned as a [`FlyHandle`]
//!
//! All devices share one [`ChannelAccess`] client.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use beamline_devices::channel::SoftIoc;
//! use beamline_devices::config::InstrumentConfig;
//! use beamline_devices::hardware::registry::DeviceRegistry;
//!
//! let config = InstrumentConfig::load()?;
//! let ioc = SoftIoc::new();
//! let registry = DeviceRegistry::from_config(Arc::new(ioc.clone()), &config)?;
//! registry.host_all(&ioc);
//!
//! let stage = registry.bundle("tomostage")?;
//! stage.cache_position().await?;
//! ```

use crate::channel::{ChannelAccess, SoftIoc};
use crate::config::{DeviceDefinition, DeviceKind, InstrumentConfig};
use crate::device::{Device, SignalReading};
use crate::error::{AppResult, DeviceError};
use crate::hardware::areadetector::{
    DetectorEnhancements, GeDetector, PointGreyDetector, SimDetector, Varex4343ct,
    DEFAULT_SETTLE_DELAY,
};
use crate::hardware::bundle::MotorBundle;
use crate::hardware::capabilities::{Stageable, Triggerable};
use crate::hardware::fly::{EnsemblePsoFlyDevice, FlyScanSettings, TaxiFlyScanDevice};
use crate::hardware::stages::{FfCamStage, SimStageAero, StageAero, TomoCamStage};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Capabilities
// =============================================================================

/// Capabilities a device can have (for introspection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Group of axes with a position cache
    Positioner,
    /// Can be staged and unstaged around a scan
    Stageable,
    /// Acquires on trigger
    Triggerable,
    /// Supports `cont_acq`
    ContinuousAcquisition,
    /// Runs a taxi/fly sequence
    FlyScan,
}

impl DeviceKind {
    /// Capabilities this kind of device provides
    pub fn capabilities(&self) -> Vec<Capability> {
        match self {
            DeviceKind::TomoCamStage
            | DeviceKind::FfCamStage
            | DeviceKind::StageAero
            | DeviceKind::SimStageAero => vec![Capability::Positioner],
            DeviceKind::TaxiFly | DeviceKind::EnsemblePsoFly => vec![Capability::FlyScan],
            DeviceKind::GeDetector | DeviceKind::SimDetector => {
                vec![Capability::Stageable, Capability::Triggerable]
            }
            DeviceKind::Varex4343ct | DeviceKind::PointGrey => vec![
                Capability::Stageable,
                Capability::Triggerable,
                Capability::ContinuousAcquisition,
            ],
        }
    }
}

// =============================================================================
// Handles
// =============================================================================

/// A registered area detector.
#[derive(Debug, Clone)]
pub enum DetectorHandle {
    Ge(Arc<GeDetector>),
    Varex(Arc<Varex4343ct>),
    PointGrey(Arc<PointGreyDetector>),
    Sim(Arc<SimDetector>),
}

impl DetectorHandle {
    pub fn as_device(&self) -> &dyn Device {
        match self {
            DetectorHandle::Ge(d) => d.as_ref(),
            DetectorHandle::Varex(d) => d.as_ref(),
            DetectorHandle::PointGrey(d) => d.as_ref(),
            DetectorHandle::Sim(d) => d.as_ref(),
        }
    }

    pub fn as_stageable(&self) -> &dyn Stageable {
        match self {
            DetectorHandle::Ge(d) => d.as_ref(),
            DetectorHandle::Varex(d) => d.as_ref(),
            DetectorHandle::PointGrey(d) => d.as_ref(),
            DetectorHandle::Sim(d) => d.as_ref(),
        }
    }

    pub fn as_triggerable(&self) -> &dyn Triggerable {
        match self {
            DetectorHandle::Ge(d) => d.as_ref(),
            DetectorHandle::Varex(d) => d.as_ref(),
            DetectorHandle::PointGrey(d) => d.as_ref(),
            DetectorHandle::Sim(d) => d.as_ref(),
        }
    }

    /// Start continuous acquisition.
    ///
    /// `period` applies to the PointGrey only and defaults to `exposure`.
    pub async fn cont_acq(&self, exposure: f64, period: Option<f64>, frames: i64) -> AppResult<()> {
        match self {
            DetectorHandle::Varex(d) => {
                if period.is_some() {
                    tracing::warn!(detector = %d.name(), "acquire period ignored by the Varex");
                }
                d.cont_acq(exposure, frames).await
            }
            DetectorHandle::PointGrey(d) => {
                d.cont_acq(exposure, period.unwrap_or(exposure), frames).await
            }
            DetectorHandle::Ge(_) | DetectorHandle::Sim(_) => Err(DeviceError::Unsupported(
                format!("'{}' has no continuous acquisition", self.as_device().name()),
            )),
        }
    }

    /// Every PV of the detector with its current value.
    pub async fn status(&self) -> AppResult<Vec<SignalReading>> {
        match self {
            DetectorHandle::Varex(d) => d.status().await,
            DetectorHandle::PointGrey(d) => d.status().await,
            DetectorHandle::Sim(d) => d.status().await,
            DetectorHandle::Ge(d) => d.read_all().await,
        }
    }

    /// One-line summary.
    pub fn help(&self) -> String {
        match self {
            DetectorHandle::Varex(d) => d.help(),
            DetectorHandle::PointGrey(d) => d.help(),
            DetectorHandle::Sim(d) => d.help(),
            DetectorHandle::Ge(d) => format!("GE detector '{}' at {}", d.name(), d.prefix()),
        }
    }
}

/// A registered fly-scan controller.
#[derive(Debug, Clone)]
pub enum FlyHandle {
    TaxiFly(Arc<TaxiFlyScanDevice>),
    EnsemblePso(Arc<EnsemblePsoFlyDevice>),
}

impl FlyHandle {
    pub fn as_device(&self) -> &dyn Device {
        match self {
            FlyHandle::TaxiFly(d) => d.as_ref(),
            FlyHandle::EnsemblePso(d) => d.as_ref(),
        }
    }

    /// Run taxi then fly.
    pub async fn plan(&self) -> AppResult<()> {
        match self {
            FlyHandle::TaxiFly(d) => d.plan().await,
            FlyHandle::EnsemblePso(d) => d.plan().await,
        }
    }

    /// Write a trajectory. Only the Ensemble PSO device has one.
    pub async fn configure(&self, settings: FlyScanSettings) -> AppResult<()> {
        match self {
            FlyHandle::EnsemblePso(d) => d.configure(settings).await,
            FlyHandle::TaxiFly(d) => Err(DeviceError::Unsupported(format!(
                "'{}' has no trajectory settings",
                d.name()
            ))),
        }
    }
}

// =============================================================================
// Device Info (for introspection)
// =============================================================================

/// Information about a registered device (returned by list operations)
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: DeviceKind,
    pub prefix: String,
    pub capabilities: Vec<Capability>,
    /// Number of PVs the device reads
    pub signal_count: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} {:<18} {:<14} {:>4} signals  {:?}",
            self.name,
            self.kind.as_str(),
            if self.prefix.is_empty() { "-" } else { self.prefix.as_str() },
            self.signal_count,
            self.capabilities
        )
    }
}

// =============================================================================
// Registered Device (Internal)
// =============================================================================

#[derive(Debug)]
enum Instance {
    Bundle(Arc<MotorBundle>),
    Detector(DetectorHandle),
    Fly(FlyHandle),
}

impl Instance {
    fn as_device(&self) -> &dyn Device {
        match self {
            Instance::Bundle(b) => b.as_ref(),
            Instance::Detector(d) => d.as_device(),
            Instance::Fly(f) => f.as_device(),
        }
    }
}

#[derive(Debug)]
struct RegisteredDevice {
    definition: DeviceDefinition,
    instance: Instance,
}

// =============================================================================
// Device Registry
// =============================================================================

/// Devices of one instrument, by name, in registration order.
pub struct DeviceRegistry {
    client: Arc<dyn ChannelAccess>,
    settle_delay: Duration,
    devices: Vec<RegisteredDevice>,
}

impl DeviceRegistry {
    /// Create an empty registry on `client`.
    pub fn new(client: Arc<dyn ChannelAccess>) -> Self {
        Self {
            client,
            settle_delay: DEFAULT_SETTLE_DELAY,
            devices: Vec::new(),
        }
    }

    /// Pause used by detectors between setup and `Acquire`.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Instantiate every enabled device of `config`.
    pub fn from_config(client: Arc<dyn ChannelAccess>, config: &InstrumentConfig) -> AppResult<Self> {
        config.validate()?;
        let mut registry = Self::new(client).with_settle_delay(config.acquisition.settle_delay());
        for definition in config.enabled_devices() {
            registry.register(definition.clone())?;
        }
        tracing::info!(
            instrument = %config.application.name,
            devices = registry.len(),
            "device registry ready"
        );
        Ok(registry)
    }

    /// Instantiate and register one device.
    ///
    /// # Errors
    /// Returns error if:
    /// - A device with the same name is already registered
    /// - The definition is incomplete (e.g. missing stage axes)
    pub fn register(&mut self, definition: DeviceDefinition) -> AppResult<()> {
        if self.contains(&definition.name) {
            return Err(DeviceError::DuplicateDevice(definition.name));
        }

        let instance = self.instantiate(&definition)?;
        tracing::debug!(
            device = %definition.name,
            kind = definition.kind.as_str(),
            prefix = %definition.prefix,
            "registered device"
        );
        self.devices.push(RegisteredDevice {
            definition,
            instance,
        });
        Ok(())
    }

    fn instantiate(&self, definition: &DeviceDefinition) -> AppResult<Instance> {
        let client = self.client.clone();
        let name = definition.name.as_str();
        let prefix = definition.prefix.as_str();

        let instance = match definition.kind {
            DeviceKind::TomoCamStage => {
                Instance::Bundle(TomoCamStage::new(client, prefix, name).bundle().clone())
            }
            DeviceKind::FfCamStage => Instance::Bundle(
                FfCamStage::from_axes(client, prefix, name, &definition.axes)?
                    .bundle()
                    .clone(),
            ),
            DeviceKind::StageAero => {
                Instance::Bundle(StageAero::new(client, prefix, name).bundle().clone())
            }
            DeviceKind::SimStageAero => {
                Instance::Bundle(SimStageAero::new(client, prefix, name).bundle().clone())
            }
            DeviceKind::TaxiFly => Instance::Fly(FlyHandle::TaxiFly(Arc::new(
                TaxiFlyScanDevice::new(client, prefix, name),
            ))),
            DeviceKind::EnsemblePsoFly => Instance::Fly(FlyHandle::EnsemblePso(Arc::new(
                EnsemblePsoFlyDevice::new(client, prefix, name),
            ))),
            DeviceKind::GeDetector => Instance::Detector(DetectorHandle::Ge(Arc::new(
                GeDetector::new(client, prefix, name),
            ))),
            DeviceKind::Varex4343ct => Instance::Detector(DetectorHandle::Varex(Arc::new(
                Varex4343ct::new(client, prefix, name).with_settle_delay(self.settle_delay),
            ))),
            DeviceKind::PointGrey => Instance::Detector(DetectorHandle::PointGrey(Arc::new(
                PointGreyDetector::new(client, prefix, name).with_settle_delay(self.settle_delay),
            ))),
            DeviceKind::SimDetector => Instance::Detector(DetectorHandle::Sim(Arc::new(
                SimDetector::new(client, prefix, name),
            ))),
        };
        Ok(instance)
    }

    fn find(&self, name: &str) -> AppResult<&RegisteredDevice> {
        self.devices
            .iter()
            .find(|d| d.definition.name == name)
            .ok_or_else(|| DeviceError::UnknownDevice(name.to_string()))
    }

    /// Check if a device is registered
    pub fn contains(&self, name: &str) -> bool {
        self.devices.iter().any(|d| d.definition.name == name)
    }

    /// Get count of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Any registered device.
    pub fn device(&self, name: &str) -> AppResult<&dyn Device> {
        Ok(self.find(name)?.instance.as_device())
    }

    /// The motor bundle of a stage.
    pub fn bundle(&self, name: &str) -> AppResult<Arc<MotorBundle>> {
        match &self.find(name)?.instance {
            Instance::Bundle(bundle) => Ok(bundle.clone()),
            _ => Err(DeviceError::Unsupported(format!("'{}' is not a motor stage", name))),
        }
    }

    /// An area detector.
    pub fn detector(&self, name: &str) -> AppResult<DetectorHandle> {
        match &self.find(name)?.instance {
            Instance::Detector(detector) => Ok(detector.clone()),
            _ => Err(DeviceError::Unsupported(format!("'{}' is not a detector", name))),
        }
    }

    /// A fly-scan controller.
    pub fn fly_device(&self, name: &str) -> AppResult<FlyHandle> {
        match &self.find(name)?.instance {
            Instance::Fly(fly) => Ok(fly.clone()),
            _ => Err(DeviceError::Unsupported(format!(
                "'{}' is not a fly-scan device",
                name
            ))),
        }
    }

    /// List all registered devices
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .map(|d| DeviceInfo {
                name: d.definition.name.clone(),
                kind: d.definition.kind,
                prefix: d.definition.prefix.clone(),
                capabilities: d.definition.kind.capabilities(),
                signal_count: d.instance.as_device().walk_signals().len(),
            })
            .collect()
    }

    /// Names of devices that have `capability`
    pub fn devices_with_capability(&self, capability: Capability) -> Vec<&str> {
        self.devices
            .iter()
            .filter(|d| d.definition.kind.capabilities().contains(&capability))
            .map(|d| d.definition.name.as_str())
            .collect()
    }

    /// Serve the PVs of every registered device from `ioc`.
    pub fn host_all(&self, ioc: &SoftIoc) {
        for device in &self.devices {
            ioc.host(device.instance.as_device());
        }
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("settle_delay", &self.settle_delay)
            .field("devices", &self.devices)
            .finish()
    }
}
