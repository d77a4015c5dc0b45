//! Beamline hardware
//!
//! Device definitions built on the signal layer:
//!
//! - `capabilities`: `Positioner`, `Triggerable`, `Stageable`
//! - `motor`: EPICS motor records
//! - `bundle`: motor groups with a position cache
//! - `stages`: the camera and sample stages of the station
//! - `fly`: taxi/fly scan controllers
//! - `areadetector`: cameras, plugins and detectors
//! - `registry`: devices instantiated from configuration

pub mod areadetector;
pub mod bundle;
pub mod capabilities;
pub mod fly;
pub mod motor;
pub mod registry;
pub mod stages;

pub use bundle::{MotorBundle, PositionTable};
pub use capabilities::{Positioner, Stageable, Triggerable};
pub use motor::{AeroEpicsMotor, EpicsMotor};
pub use registry::{DetectorHandle, DeviceRegistry, FlyHandle};
