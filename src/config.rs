//! Instrument Configuration using Figment
//!
//! Strongly-typed configuration for the devices of one beamline instrument.
//! Configuration is loaded from:
//! 1. `config/instrument.toml` (or any file passed to [`InstrumentConfig::load_from`])
//! 2. Environment variables prefixed with `BEAMLINE_`, nested keys separated by `__`
//!    (e.g. `BEAMLINE_APPLICATION__LOG_LEVEL=debug`)
//!
//! # Example
//! ```no_run
//! use beamline_devices::config::InstrumentConfig;
//!
//! let config = InstrumentConfig::load_from("config/instrument.toml")?;
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::error::{AppResult, DeviceError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Top-level instrument configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Acquisition helper settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    /// Device instances
    #[serde(default)]
    pub devices: Vec<DeviceDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Instrument name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

/// Continuous acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Pause between writing camera settings and starting acquisition
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
        }
    }
}

impl AcquisitionConfig {
    /// Settle delay as a `Duration`.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Kind of device to instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Tomography camera stage (tomox, tomoy, tomoz)
    TomoCamStage,
    /// Far-field camera stage (ffx, ffz)
    FfCamStage,
    /// HT-HEDM sample stack with air-bearing rotation
    StageAero,
    /// Simulated HT-HEDM sample stack
    SimStageAero,
    /// Taxi/fly busy-record pair
    TaxiFly,
    /// Aerotech Ensemble PSO fly scan
    EnsemblePsoFly,
    /// GE area detector
    GeDetector,
    /// Varex 4343CT area detector
    Varex4343ct,
    /// PointGrey Grasshopper3 camera
    PointGrey,
    /// areaDetector simulation camera
    SimDetector,
}

impl DeviceKind {
    /// Stable snake_case name, as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::TomoCamStage => "tomo_cam_stage",
            DeviceKind::FfCamStage => "ff_cam_stage",
            DeviceKind::StageAero => "stage_aero",
            DeviceKind::SimStageAero => "sim_stage_aero",
            DeviceKind::TaxiFly => "taxi_fly",
            DeviceKind::EnsemblePsoFly => "ensemble_pso_fly",
            DeviceKind::GeDetector => "ge_detector",
            DeviceKind::Varex4343ct => "varex4343ct",
            DeviceKind::PointGrey => "point_grey",
            DeviceKind::SimDetector => "sim_detector",
        }
    }
}

/// One device instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDefinition {
    /// Unique device name
    pub name: String,
    /// Device kind
    pub kind: DeviceKind,
    /// PV prefix prepended to every component suffix
    #[serde(default)]
    pub prefix: String,
    /// Whether this device is instantiated
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Axis PV overrides for stages whose motors are not fixed
    #[serde(default)]
    pub axes: BTreeMap<String, String>,
}

fn default_name() -> String {
    "6-ID-D HEDM".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_settle_delay() -> u64 {
    500
}

fn default_enabled() -> bool {
    true
}

impl InstrumentConfig {
    /// Load configuration from `config/instrument.toml` and environment variables
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("config/instrument.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(InstrumentConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BEAMLINE_").split("__"))
            .extract()
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        crate::logging::parse_log_level(&self.application.log_level)
            .map_err(DeviceError::Configuration)?;
        self.application
            .log_format
            .parse::<crate::logging::OutputFormat>()
            .map_err(DeviceError::Configuration)?;

        let mut names = HashSet::new();
        for device in &self.devices {
            if device.name.is_empty() {
                return Err(DeviceError::Configuration(
                    "Device name must not be empty".to_string(),
                ));
            }
            if !names.insert(&device.name) {
                return Err(DeviceError::Configuration(format!(
                    "Duplicate device name: {}",
                    device.name
                )));
            }
            if device.kind == DeviceKind::FfCamStage {
                for axis in ["ffx", "ffz"] {
                    if !device.axes.contains_key(axis) {
                        return Err(DeviceError::Configuration(format!(
                            "Device '{}' needs a PV for axis '{}'",
                            device.name, axis
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Devices marked enabled, in file order
    pub fn enabled_devices(&self) -> impl Iterator<Item = &DeviceDefinition> {
        self.devices.iter().filter(|d| d.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, kind: DeviceKind) -> DeviceDefinition {
        DeviceDefinition {
            name: name.to_string(),
            kind,
            prefix: String::new(),
            enabled: true,
            axes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = InstrumentConfig::default();
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.acquisition.settle_delay(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = InstrumentConfig::default();
        config.application.log_level = "chatty".to_string();
        assert!(matches!(
            config.validate(),
            Err(DeviceError::Configuration(_))
        ));
    }

    #[test]
    fn test_duplicate_device_names() {
        let config = InstrumentConfig {
            devices: vec![
                device("tomostage", DeviceKind::TomoCamStage),
                device("tomostage", DeviceKind::StageAero),
            ],
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate device name"));
    }

    #[test]
    fn test_ff_stage_requires_axes() {
        let mut ff = device("ffstage", DeviceKind::FfCamStage);
        let config = InstrumentConfig {
            devices: vec![ff.clone()],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        ff.axes.insert("ffx".into(), "6idhedm:m50".into());
        ff.axes.insert("ffz".into(), "6idhedm:m51".into());
        let config = InstrumentConfig {
            devices: vec![ff],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enabled_devices() {
        let mut disabled = device("det", DeviceKind::PointGrey);
        disabled.enabled = false;
        let config = InstrumentConfig {
            devices: vec![device("psofly", DeviceKind::EnsemblePsoFly), disabled],
            ..Default::default()
        };

        let names: Vec<_> = config.enabled_devices().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["psofly"]);
    }
}
