//! # Beamline Devices
//!
//! Device support for the 6-ID-D high-energy diffraction microscopy station:
//! area detectors, motor stages with a position cache, and taxi/fly scan
//! controllers, all addressed through process variables.
//!
//! ## Crate Structure
//!
//! - **`channel`**: The `ChannelAccess` client boundary and `SoftIoc`, an
//!   in-memory IOC used for simulation and tests.
//! - **`signal`**: Components bound to one PV (`Signal`, `SignalRo`,
//!   `SignalWithRbv`).
//! - **`status`**: `Status` handles for operations in flight.
//! - **`device`**: The `Device` and `Component` traits shared by everything
//!   with PVs.
//! - **`hardware`**: Motors, bundles, stages, fly devices, area detectors and
//!   the device registry.
//! - **`config`**: Instrument configuration loaded with `figment`.
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: The `DeviceError` enum.

pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod signal;
pub mod status;

pub use error::{AppResult, DeviceError};
