//! Device Capabilities
//!
//! Fine-grained capability traits that devices implement instead of a single
//! monolithic device trait:
//!
//! - A motor implements `Positioner`
//! - An area detector implements `Stageable + Triggerable`
//!
//! Generic code (position caching, scans) is written against these bounds and
//! probes for them at runtime through [`crate::device::Component::as_positioner`].
//!
//! # Design
//!
//! Each capability trait:
//! - Is thread-safe (requires Send + Sync)
//! - Returns `AppResult` with `DeviceError`
//! - Starts long operations without waiting and hands back a [`Status`]

use crate::error::AppResult;
use crate::status::Status;
use async_trait::async_trait;

/// Capability: Positioning
///
/// Devices that can move to an absolute position (motors, pseudo-axes).
///
/// # Contract
/// - Positions are in the device's engineering units
/// - `move_to` issues the request immediately and returns without waiting;
///   the returned [`Status`] completes when motion is done
/// - `position` returns the current readback (approximate while moving)
#[async_trait]
pub trait Positioner: Send + Sync {
    /// Name of the positioner.
    fn name(&self) -> &str;

    /// Current readback position.
    async fn position(&self) -> AppResult<f64>;

    /// Start a move to `target`.
    ///
    /// Must be called from within a tokio runtime.
    fn move_to(&self, target: f64) -> Status;

    /// Move and wait for completion.
    async fn move_and_wait(&self, target: f64) -> AppResult<()> {
        self.move_to(target).wait().await
    }

    /// Halt motion in progress.
    async fn stop(&self) -> AppResult<()>;
}

/// Capability: Triggered acquisition
///
/// # Contract
/// - `trigger()` starts one acquisition and returns immediately
/// - The returned status completes when the acquisition finishes
pub trait Triggerable: Send + Sync {
    /// Start one acquisition.
    fn trigger(&self) -> Status;
}

/// Capability: Staging
///
/// Devices that must be prepared before an acquisition sequence and restored
/// afterwards.
#[async_trait]
pub trait Stageable: Send + Sync {
    /// Prepare for acquisition, remembering the settings that are changed.
    async fn stage(&self) -> AppResult<()>;

    /// Restore the settings changed by `stage`.
    async fn unstage(&self) -> AppResult<()>;

    /// Query staging state
    fn is_staged(&self) -> bool;
}
