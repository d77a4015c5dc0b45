//! Instrument configuration loading and registry construction.

use beamline_devices::channel::{ChannelValue, SoftIoc};
use beamline_devices::config::{DeviceKind, InstrumentConfig};
use beamline_devices::hardware::registry::Capability;
use beamline_devices::hardware::DeviceRegistry;
use beamline_devices::DeviceError;
use serial_test::serial;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

const INSTRUMENT: &str = r#"
[application]
name = "test station"
log_level = "debug"

[acquisition]
settle_delay_ms = 0

[[devices]]
name = "tomostage"
kind = "tomo_cam_stage"

[[devices]]
name = "ffstage"
kind = "ff_cam_stage"
enabled = false

[devices.axes]
ffx = "6idhedm:m50"
ffz = "6idhedm:m51"

[[devices]]
name = "psofly"
kind = "ensemble_pso_fly"
prefix = "6idhedms1:PSOFly1:"

[[devices]]
name = "det"
kind = "point_grey"
prefix = "1idPG4:"

[[devices]]
name = "ge"
kind = "ge_detector"
prefix = "GE2:"
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_load_from_file() {
    let file = write_config(INSTRUMENT);

    let config = InstrumentConfig::load_from(file.path()).unwrap();

    assert_eq!(config.application.name, "test station");
    assert_eq!(config.application.log_level, "debug");
    // Not in the file
    assert_eq!(config.application.log_format, "pretty");
    assert_eq!(config.acquisition.settle_delay(), Duration::ZERO);
    assert_eq!(config.devices.len(), 5);
    assert_eq!(config.devices[1].kind, DeviceKind::FfCamStage);
    assert!(!config.devices[1].enabled);
    assert_eq!(config.devices[1].axes["ffz"], "6idhedm:m51");
    assert!(config.validate().is_ok());
}

#[tokio::test]
#[serial]
async fn test_registry_skips_disabled_devices() {
    let file = write_config(INSTRUMENT);
    let config = InstrumentConfig::load_from(file.path()).unwrap();
    let ioc = SoftIoc::new();

    let registry = DeviceRegistry::from_config(Arc::new(ioc.clone()), &config).unwrap();
    registry.host_all(&ioc);

    let names: Vec<String> = registry.list_devices().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["tomostage", "psofly", "det", "ge"]);
    assert!(matches!(
        registry.bundle("ffstage"),
        Err(DeviceError::UnknownDevice(_))
    ));
    assert_eq!(
        registry.devices_with_capability(Capability::ContinuousAcquisition),
        vec!["det"]
    );

    // Stage PVs are served once hosted
    assert!(ioc.contains("6idhedm:m48.RBV"));
    let positions = registry.bundle("tomostage").unwrap().positions().await.unwrap();
    assert_eq!(positions.len(), 3);

    // Settle delay from the file reaches the detector
    let det = registry.detector("det").unwrap();
    det.cont_acq(0.01, Some(0.02), -1).await.unwrap();
    assert_eq!(
        ioc.puts_to("1idPG4:cam1:ImageMode"),
        vec![ChannelValue::from("Continuous")]
    );
}

#[tokio::test]
#[serial]
async fn test_cont_acq_unsupported_on_ge() {
    let file = write_config(INSTRUMENT);
    let config = InstrumentConfig::load_from(file.path()).unwrap();
    let ioc = SoftIoc::new();
    let registry = DeviceRegistry::from_config(Arc::new(ioc.clone()), &config).unwrap();
    registry.host_all(&ioc);

    let ge = registry.detector("ge").unwrap();
    let err = ge.cont_acq(0.1, None, 5).await.unwrap_err();

    assert!(matches!(err, DeviceError::Unsupported(_)));
    assert!(ioc.journal().is_empty());
}

#[test]
#[serial]
fn test_duplicate_device_name_rejected() {
    let file = write_config(
        r#"
[[devices]]
name = "det"
kind = "point_grey"
prefix = "1idPG4:"

[[devices]]
name = "det"
kind = "varex4343ct"
prefix = "6IDFF:"
"#,
    );
    let config = InstrumentConfig::load_from(file.path()).unwrap();

    assert!(matches!(config.validate(), Err(DeviceError::Configuration(_))));
    assert!(DeviceRegistry::from_config(Arc::new(SoftIoc::new()), &config).is_err());
}

#[test]
#[serial]
fn test_ff_stage_requires_axes() {
    let file = write_config(
        r#"
[[devices]]
name = "ffstage"
kind = "ff_cam_stage"

[devices.axes]
ffx = "6idhedm:m50"
"#,
    );
    let config = InstrumentConfig::load_from(file.path()).unwrap();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("ffz"));
}

#[test]
#[serial]
fn test_unknown_kind_fails_to_load() {
    let file = write_config(
        r#"
[[devices]]
name = "mystery"
kind = "flux_capacitor"
"#,
    );

    assert!(InstrumentConfig::load_from(file.path()).is_err());
}

#[test]
#[serial]
fn test_env_overrides_file() {
    let file = write_config(INSTRUMENT);
    std::env::set_var("BEAMLINE_APPLICATION__LOG_LEVEL", "warn");
    std::env::set_var("BEAMLINE_ACQUISITION__SETTLE_DELAY_MS", "250");

    let config = InstrumentConfig::load_from(file.path());

    std::env::remove_var("BEAMLINE_APPLICATION__LOG_LEVEL");
    std::env::remove_var("BEAMLINE_ACQUISITION__SETTLE_DELAY_MS");

    let config = config.unwrap();
    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.acquisition.settle_delay(), Duration::from_millis(250));
}

#[test]
#[serial]
fn test_invalid_log_level_fails_validation() {
    let file = write_config(INSTRUMENT);
    std::env::set_var("BEAMLINE_APPLICATION__LOG_LEVEL", "loud");

    let config = InstrumentConfig::load_from(file.path());
    std::env::remove_var("BEAMLINE_APPLICATION__LOG_LEVEL");

    assert!(config.unwrap().validate().is_err());
}
