//! Motor stages of the 6-ID-D HEDM station.
//!
//! Each stage owns its motors and a [`MotorBundle`] grouping them, so the
//! whole stage can be cached, resumed and summarized at once. PV suffixes
//! here are absolute record names; the construction prefix is prepended and
//! is normally empty.

use crate::channel::ChannelAccess;
use crate::error::{AppResult, DeviceError};
use crate::hardware::bundle::MotorBundle;
use crate::hardware::motor::{AeroEpicsMotor, EpicsMotor};
use std::collections::BTreeMap;
use std::sync::Arc;

fn motor(
    client: &Arc<dyn ChannelAccess>,
    prefix: &str,
    suffix: &str,
    bundle: &str,
    attr: &str,
) -> Arc<EpicsMotor> {
    Arc::new(EpicsMotor::new(
        client.clone(),
        &format!("{}{}", prefix, suffix),
        format!("{}_{}", bundle, attr),
    ))
}

// =============================================================================
// Camera stages
// =============================================================================

/// Motor stack carrying the tomography camera.
#[derive(Debug)]
pub struct TomoCamStage {
    pub tomoy: Arc<EpicsMotor>,
    pub tomox: Arc<EpicsMotor>,
    pub tomoz: Arc<EpicsMotor>,
    bundle: Arc<MotorBundle>,
}

impl TomoCamStage {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: &str) -> Self {
        let tomoy = motor(&client, prefix, "6idhedm:m48", name, "tomoy");
        let tomox = motor(&client, prefix, "6idhedm:m45", name, "tomox");
        let tomoz = motor(&client, prefix, "6idhedm:m46", name, "tomoz");
        let bundle = MotorBundle::new(name, prefix)
            .with_component("tomoy", tomoy.clone())
            .with_component("tomox", tomox.clone())
            .with_component("tomoz", tomoz.clone());
        Self {
            tomoy,
            tomox,
            tomoz,
            bundle: Arc::new(bundle),
        }
    }

    pub fn bundle(&self) -> &Arc<MotorBundle> {
        &self.bundle
    }
}

/// Motor stack carrying the far-field detector.
///
/// The record names of its axes differ between setups and are passed in.
#[derive(Debug)]
pub struct FfCamStage {
    pub ffx: Arc<EpicsMotor>,
    pub ffz: Arc<EpicsMotor>,
    bundle: Arc<MotorBundle>,
}

impl FfCamStage {
    pub fn new(
        client: Arc<dyn ChannelAccess>,
        prefix: &str,
        name: &str,
        ffx_pv: &str,
        ffz_pv: &str,
    ) -> Self {
        let ffx = motor(&client, prefix, ffx_pv, name, "ffx");
        let ffz = motor(&client, prefix, ffz_pv, name, "ffz");
        let bundle = MotorBundle::new(name, prefix)
            .with_component("ffx", ffx.clone())
            .with_component("ffz", ffz.clone());
        Self {
            ffx,
            ffz,
            bundle: Arc::new(bundle),
        }
    }

    /// Build from configured axis PVs (`ffx`, `ffz`).
    pub fn from_axes(
        client: Arc<dyn ChannelAccess>,
        prefix: &str,
        name: &str,
        axes: &BTreeMap<String, String>,
    ) -> AppResult<Self> {
        let axis = |key: &str| {
            axes.get(key).ok_or_else(|| {
                DeviceError::Configuration(format!(
                    "Device '{}' needs a PV for axis '{}'",
                    name, key
                ))
            })
        };
        Ok(Self::new(client, prefix, name, axis("ffx")?, axis("ffz")?))
    }

    pub fn bundle(&self) -> &Arc<MotorBundle> {
        &self.bundle
    }
}

// =============================================================================
// Sample stages
// =============================================================================

/// Record names of the HT-HEDM sample stack axes.
struct AeroAxes {
    kx: &'static str,
    ky: &'static str,
    kz: &'static str,
    kx_tilt: &'static str,
    kz_tilt: &'static str,
    rot: &'static str,
    x_base: &'static str,
    tiltx_base: &'static str,
    tiltz_base: &'static str,
}

const STAGE_AERO_AXES: AeroAxes = AeroAxes {
    kx: "6idhedm:m41",
    ky: "6idhedm:m40",
    kz: "6idhedm:m42",
    kx_tilt: "6idhedm:m44",
    kz_tilt: "6idhedm:m43",
    rot: "6idhedms1:m1",
    x_base: "6idhedm:m37",
    tiltx_base: "6idhedm:m38",
    tiltz_base: "6idhedm:m39",
};

// Unused axes on the simulator all point at m16
const SIM_STAGE_AERO_AXES: AeroAxes = AeroAxes {
    kx: "6iddSIM:m1",
    ky: "6iddSIM:m2",
    kz: "6iddSIM:m3",
    kx_tilt: "6iddSIM:m16",
    kz_tilt: "6iddSIM:m16",
    rot: "6iddSIM:m4",
    x_base: "6iddSIM:m16",
    tiltx_base: "6iddSIM:m16",
    tiltz_base: "6iddSIM:m16",
};

/// Sample stack of the HT-HEDM instrument on the air-bearing rotation.
#[derive(Debug)]
pub struct StageAero {
    pub kx: Arc<EpicsMotor>,
    pub ky: Arc<EpicsMotor>,
    pub kz: Arc<EpicsMotor>,
    pub kx_tilt: Arc<EpicsMotor>,
    pub kz_tilt: Arc<EpicsMotor>,
    pub rot: Arc<AeroEpicsMotor>,
    pub x_base: Arc<EpicsMotor>,
    pub tiltx_base: Arc<EpicsMotor>,
    pub tiltz_base: Arc<EpicsMotor>,
    bundle: Arc<MotorBundle>,
}

impl StageAero {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: &str) -> Self {
        let axes = STAGE_AERO_AXES;
        let m = |suffix: &str, attr: &str| motor(&client, prefix, suffix, name, attr);
        let kx = m(axes.kx, "kx");
        let ky = m(axes.ky, "ky");
        let kz = m(axes.kz, "kz");
        let kx_tilt = m(axes.kx_tilt, "kx_tilt");
        let kz_tilt = m(axes.kz_tilt, "kz_tilt");
        let x_base = m(axes.x_base, "x_base");
        let tiltx_base = m(axes.tiltx_base, "tiltx_base");
        let tiltz_base = m(axes.tiltz_base, "tiltz_base");
        let rot = Arc::new(AeroEpicsMotor::new(
            client.clone(),
            &format!("{}{}", prefix, axes.rot),
            format!("{}_rot", name),
        ));

        let bundle = MotorBundle::new(name, prefix)
            .with_component("kx", kx.clone())
            .with_component("ky", ky.clone())
            .with_component("kz", kz.clone())
            .with_component("kx_tilt", kx_tilt.clone())
            .with_component("kz_tilt", kz_tilt.clone())
            .with_component("rot", rot.clone())
            .with_component("x_base", x_base.clone())
            .with_component("tiltx_base", tiltx_base.clone())
            .with_component("tiltz_base", tiltz_base.clone());

        Self {
            kx,
            ky,
            kz,
            kx_tilt,
            kz_tilt,
            rot,
            x_base,
            tiltx_base,
            tiltz_base,
            bundle: Arc::new(bundle),
        }
    }

    pub fn bundle(&self) -> &Arc<MotorBundle> {
        &self.bundle
    }
}

/// HT-HEDM sample stack on the motor simulator.
#[derive(Debug)]
pub struct SimStageAero {
    pub kx: Arc<EpicsMotor>,
    pub ky: Arc<EpicsMotor>,
    pub kz: Arc<EpicsMotor>,
    pub kx_tilt: Arc<EpicsMotor>,
    pub kz_tilt: Arc<EpicsMotor>,
    pub rot: Arc<EpicsMotor>,
    pub x_base: Arc<EpicsMotor>,
    pub tiltx_base: Arc<EpicsMotor>,
    pub tiltz_base: Arc<EpicsMotor>,
    bundle: Arc<MotorBundle>,
}

impl SimStageAero {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: &str) -> Self {
        let axes = SIM_STAGE_AERO_AXES;
        let m = |suffix: &str, attr: &str| motor(&client, prefix, suffix, name, attr);
        let kx = m(axes.kx, "kx");
        let ky = m(axes.ky, "ky");
        let kz = m(axes.kz, "kz");
        let kx_tilt = m(axes.kx_tilt, "kx_tilt");
        let kz_tilt = m(axes.kz_tilt, "kz_tilt");
        let rot = m(axes.rot, "rot");
        let x_base = m(axes.x_base, "x_base");
        let tiltx_base = m(axes.tiltx_base, "tiltx_base");
        let tiltz_base = m(axes.tiltz_base, "tiltz_base");

        let bundle = MotorBundle::new(name, prefix)
            .with_component("kx", kx.clone())
            .with_component("ky", ky.clone())
            .with_component("kz", kz.clone())
            .with_component("kx_tilt", kx_tilt.clone())
            .with_component("kz_tilt", kz_tilt.clone())
            .with_component("rot", rot.clone())
            .with_component("x_base", x_base.clone())
            .with_component("tiltx_base", tiltx_base.clone())
            .with_component("tiltz_base", tiltz_base.clone());

        Self {
            kx,
            ky,
            kz,
            kx_tilt,
            kz_tilt,
            rot,
            x_base,
            tiltx_base,
            tiltz_base,
            bundle: Arc::new(bundle),
        }
    }

    pub fn bundle(&self) -> &Arc<MotorBundle> {
        &self.bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SoftIoc;
    use crate::device::{Component, Device};

    fn client() -> Arc<dyn ChannelAccess> {
        Arc::new(SoftIoc::new())
    }

    #[test]
    fn test_tomo_stage_pvs() {
        let stage = TomoCamStage::new(client(), "", "tomostage");

        assert_eq!(stage.tomoy.address(), "6idhedm:m48");
        assert_eq!(stage.tomox.address(), "6idhedm:m45");
        assert_eq!(stage.tomoz.address(), "6idhedm:m46");
        assert_eq!(stage.bundle().component_names(), vec!["tomoy", "tomox", "tomoz"]);
    }

    #[test]
    fn test_stage_aero_rotation_is_aero_motor() {
        let stage = StageAero::new(client(), "", "hedm");

        assert_eq!(stage.rot.address(), "6idhedms1:m1");
        assert_eq!(stage.kz_tilt.address(), "6idhedm:m43");
        assert_eq!(stage.bundle().component_names().len(), 9);
        assert!(stage
            .bundle()
            .describe()
            .iter()
            .any(|d| d.pv == "6idhedms1:m1.DRBV"));
    }

    #[test]
    fn test_sim_stage_shares_unused_axis() {
        let stage = SimStageAero::new(client(), "", "sim");

        assert_eq!(stage.rot.address(), "6iddSIM:m4");
        assert_eq!(stage.x_base.address(), "6iddSIM:m16");
        assert_eq!(stage.tiltz_base.address(), "6iddSIM:m16");
    }

    #[test]
    fn test_ff_stage_from_axes() {
        let mut axes = BTreeMap::new();
        axes.insert("ffx".to_string(), "6idhedm:m50".to_string());
        assert!(FfCamStage::from_axes(client(), "", "ffstage", &axes).is_err());

        axes.insert("ffz".to_string(), "6idhedm:m51".to_string());
        let stage = FfCamStage::from_axes(client(), "", "ffstage", &axes).unwrap();
        assert_eq!(stage.ffz.address(), "6idhedm:m51");
    }
}
