//! EPICS motor records.
//!
//! [`EpicsMotor`] binds the fields of one motor record (`.VAL`, `.RBV`,
//! `.DMOV`, ...) under a base PV such as `6idhedm:m48`. [`AeroEpicsMotor`]
//! adds the dial fields used by the Aerotech air-bearing rotation stage.
//!
//! Both implement [`Positioner`]: `move_to` checks the soft limits, then
//! issues a completion put on the setpoint, so the returned [`Status`]
//! finishes when the record reports the move done.

use crate::channel::soft_ioc::RecordKind;
use crate::channel::ChannelAccess;
use crate::device::{signal_entries, Component, Device, SignalEntry};
use crate::error::{AppResult, DeviceError};
use crate::hardware::capabilities::Positioner;
use crate::signal::{Kind, Signal, SignalRo};
use crate::status::Status;
use async_trait::async_trait;
use std::sync::Arc;

/// One motor record.
#[derive(Debug, Clone)]
pub struct EpicsMotor {
    name: String,
    prefix: String,
    pub user_readback: SignalRo,
    pub user_setpoint: Signal,
    pub motor_done_move: SignalRo,
    pub motor_stop: Signal,
    pub velocity: Signal,
    pub high_limit: Signal,
    pub low_limit: Signal,
    pub motor_egu: SignalRo,
}

impl EpicsMotor {
    /// Bind the motor record at `prefix` (e.g. `"6idhedm:m48"`).
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: impl Into<String>) -> Self {
        let field = |suffix: &str| format!("{}{}", prefix, suffix);
        Self {
            name: name.into(),
            prefix: prefix.to_string(),
            user_readback: SignalRo::new(client.clone(), field(".RBV")).with_kind(Kind::Hinted),
            user_setpoint: Signal::new(client.clone(), field(".VAL"))
                .with_record(RecordKind::MotorSetpoint)
                .with_put_complete(true),
            motor_done_move: SignalRo::new(client.clone(), field(".DMOV"))
                .with_kind(Kind::Omitted),
            motor_stop: Signal::new(client.clone(), field(".STOP")).with_kind(Kind::Omitted),
            velocity: Signal::new(client.clone(), field(".VELO")).with_kind(Kind::Config),
            high_limit: Signal::new(client.clone(), field(".HLM")).with_kind(Kind::Config),
            low_limit: Signal::new(client.clone(), field(".LLM")).with_kind(Kind::Config),
            motor_egu: SignalRo::new(client, field(".EGU")).with_kind(Kind::Config),
        }
    }

    /// True when the record reports motion complete.
    pub async fn done_moving(&self) -> AppResult<bool> {
        Ok(self.motor_done_move.get_f64().await? != 0.0)
    }

    /// Soft limits as `(low, high)`.
    pub async fn limits(&self) -> AppResult<(f64, f64)> {
        Ok((self.low_limit.get_f64().await?, self.high_limit.get_f64().await?))
    }

    /// Engineering units.
    pub async fn egu(&self) -> AppResult<String> {
        Ok(crate::signal::ReadSignal::get(&self.motor_egu)
            .await?
            .to_string())
    }
}

/// Reject `target` when the limits are set and it falls outside them.
///
/// Limits are considered unset when `low >= high`, as in the motor record.
fn check_limits(motor: &str, target: f64, low: f64, high: f64) -> AppResult<()> {
    if low < high && !(low..=high).contains(&target) {
        return Err(DeviceError::LimitViolation {
            motor: motor.to_string(),
            target,
            low,
            high,
        });
    }
    Ok(())
}

#[async_trait]
impl Positioner for EpicsMotor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn position(&self) -> AppResult<f64> {
        self.user_readback.get_f64().await
    }

    fn move_to(&self, target: f64) -> Status {
        let name = self.name.clone();
        let setpoint = self.user_setpoint.clone();
        let low_limit = self.low_limit.clone();
        let high_limit = self.high_limit.clone();

        tracing::info!(motor = %name, target, "move");
        Status::spawn(self.name.clone(), async move {
            let low = low_limit.get_f64().await?;
            let high = high_limit.get_f64().await?;
            check_limits(&name, target, low, high)?;
            setpoint.put(target).await?;
            tracing::debug!(motor = %name, target, "move complete");
            Ok(())
        })
    }

    async fn stop(&self) -> AppResult<()> {
        tracing::info!(motor = %self.name, "stop");
        self.motor_stop.put(1_i64).await
    }
}

impl Component for EpicsMotor {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        signal_entries!(self;
            user_readback,
            user_setpoint,
            motor_done_move,
            motor_stop,
            velocity,
            high_limit,
            low_limit,
            motor_egu,
        )
    }

    fn address(&self) -> &str {
        &self.prefix
    }

    fn as_positioner(&self) -> Option<&dyn Positioner> {
        Some(self)
    }
}

impl Device for EpicsMotor {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn component_names(&self) -> Vec<&str> {
        vec![
            "user_readback",
            "user_setpoint",
            "motor_done_move",
            "motor_stop",
            "velocity",
            "high_limit",
            "low_limit",
            "motor_egu",
        ]
    }

    fn walk_signals(&self) -> Vec<SignalEntry<'_>> {
        self.signals()
    }
}

/// Motor record of the Aerotech rotation stage, with dial fields.
#[derive(Debug, Clone)]
pub struct AeroEpicsMotor {
    pub motor: EpicsMotor,
    pub dial_readback: SignalRo,
    pub dial_setpoint: Signal,
}

impl AeroEpicsMotor {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: impl Into<String>) -> Self {
        Self {
            motor: EpicsMotor::new(client.clone(), prefix, name),
            dial_readback: SignalRo::new(client.clone(), format!("{}.DRBV", prefix))
                .with_kind(Kind::Hinted),
            dial_setpoint: Signal::new(client, format!("{}.DVAL", prefix)),
        }
    }

    /// Dial (raw) position.
    pub async fn dial_position(&self) -> AppResult<f64> {
        self.dial_readback.get_f64().await
    }
}

#[async_trait]
impl Positioner for AeroEpicsMotor {
    fn name(&self) -> &str {
        Positioner::name(&self.motor)
    }

    async fn position(&self) -> AppResult<f64> {
        self.motor.position().await
    }

    fn move_to(&self, target: f64) -> Status {
        self.motor.move_to(target)
    }

    async fn stop(&self) -> AppResult<()> {
        self.motor.stop().await
    }
}

impl Component for AeroEpicsMotor {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.motor.signals();
        entries.extend(signal_entries!(self; dial_readback, dial_setpoint));
        entries
    }

    fn address(&self) -> &str {
        self.motor.address()
    }

    fn as_positioner(&self) -> Option<&dyn Positioner> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelValue, SoftIoc};

    fn motor(position: f64) -> (SoftIoc, EpicsMotor) {
        let ioc = SoftIoc::new();
        ioc.add_motor("6idhedm:m48", position);
        ioc.set("6idhedm:m48.VELO", 1000.0);
        let client: Arc<dyn ChannelAccess> = Arc::new(ioc.clone());
        (ioc, EpicsMotor::new(client, "6idhedm:m48", "tomostage_tomoy"))
    }

    #[tokio::test]
    async fn test_move_reaches_target() {
        let (ioc, motor) = motor(1.5);
        assert_eq!(motor.position().await.unwrap(), 1.5);

        motor.move_to(2.0).wait().await.unwrap();

        assert_eq!(motor.position().await.unwrap(), 2.0);
        assert!(motor.done_moving().await.unwrap());
        assert_eq!(
            ioc.puts_to("6idhedm:m48.VAL"),
            vec![ChannelValue::Double(2.0)]
        );
    }

    #[tokio::test]
    async fn test_soft_limits_reject_move() {
        let (ioc, motor) = motor(0.0);
        ioc.set("6idhedm:m48.LLM", -5.0);
        ioc.set("6idhedm:m48.HLM", 5.0);

        let err = motor.move_to(7.5).wait().await.unwrap_err();

        assert!(matches!(err, DeviceError::LimitViolation { target, .. } if target == 7.5));
        assert!(ioc.puts_to("6idhedm:m48.VAL").is_empty());
    }

    #[test]
    fn test_unset_limits_allow_anything() {
        assert!(check_limits("m", 1e6, 0.0, 0.0).is_ok());
        assert!(check_limits("m", -3.0, -2.0, 2.0).is_err());
        assert!(check_limits("m", 2.0, -2.0, 2.0).is_ok());
    }

    #[tokio::test]
    async fn test_aero_motor_signals() {
        let ioc = SoftIoc::new();
        ioc.add_motor("6idhedms1:m1", 90.0);
        let rot = AeroEpicsMotor::new(Arc::new(ioc), "6idhedms1:m1", "hedm_rot");

        let names: Vec<_> = rot.signals().into_iter().map(|e| e.name).collect();
        assert!(names.contains(&"dial_readback".to_string()));
        assert_eq!(rot.dial_position().await.unwrap(), 90.0);
        assert_eq!(rot.address(), "6idhedms1:m1");
        assert!(rot.as_positioner().is_some());
    }
}
