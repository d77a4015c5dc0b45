//! Taxi/fly scans driven by a pair of busy records.
//!
//! Some fly scans at the APS are run by external controls triggered through
//! two busy records. Setting `taxi` makes the controller prepare the hardware
//! (move to the start, arm the PSO); it resets the record when ready. Setting
//! `fly` runs the actual motion and is reset when the motion ends. Writing
//! either record with a completion put therefore returns once the phase is
//! over.
//!
//! The FPGA signals route encoder and PSO outputs on the softGlue board
//! (`6idMZ1:SG:`) and are fixed for the station.

use crate::channel::soft_ioc::RecordKind;
use crate::channel::ChannelAccess;
use crate::device::{signal_entries, Device, SignalEntry};
use crate::error::{AppResult, DeviceError};
use crate::signal::{Kind, ReadSignal, Signal, SignalRo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const RESET_FPGA_PV: &str = "6idMZ1:SG:BUFFER-1_IN_Signal.PROC";
const PSO_STATE_PV: &str = "6idMZ1:SG:AND-1_IN1_Signal";

fn fpga_input_pv(index: usize) -> String {
    format!("6idMZ1:SG:FI{}_Signal", index)
}

/// Busy-record pair plus the softGlue routing signals.
#[derive(Debug, Clone)]
pub struct TaxiFlyScanDevice {
    name: String,
    prefix: String,
    pub taxi: Signal,
    pub fly: Signal,
    pub reset_fpga: Signal,
    pub pso_state: Signal,
    pub fi1_signal: Signal,
    pub fi2_signal: Signal,
    pub fi3_signal: Signal,
    pub fi4_signal: Signal,
    pub fi5_signal: Signal,
}

impl TaxiFlyScanDevice {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: impl Into<String>) -> Self {
        let busy = |suffix: &str| {
            Signal::new(client.clone(), format!("{}{}", prefix, suffix))
                .with_record(RecordKind::Busy)
                .with_put_complete(true)
        };
        let fixed = |pv: String| {
            Signal::new(client.clone(), pv)
                .with_kind(Kind::Config)
                .with_put_complete(true)
        };
        Self {
            name: name.into(),
            prefix: prefix.to_string(),
            taxi: busy("taxi"),
            fly: busy("fly"),
            reset_fpga: fixed(RESET_FPGA_PV.to_string()),
            pso_state: fixed(PSO_STATE_PV.to_string()),
            fi1_signal: fixed(fpga_input_pv(1)),
            fi2_signal: fixed(fpga_input_pv(2)),
            fi3_signal: fixed(fpga_input_pv(3)),
            fi4_signal: fixed(fpga_input_pv(4)),
            fi5_signal: fixed(fpga_input_pv(5)),
        }
    }

    /// Run the scan: taxi to the start, then fly.
    ///
    /// Each phase writes the busy record's active state and returns when the
    /// external controller resets it. `fly` is not written until `taxi` has
    /// completed.
    pub async fn plan(&self) -> AppResult<()> {
        for (phase, busy) in [("taxi", &self.taxi), ("fly", &self.fly)] {
            let states = busy.enum_strings().await?;
            let active = states.get(1).cloned().ok_or_else(|| {
                DeviceError::channel(busy.pvname(), "busy record has no active state")
            })?;

            tracing::info!(device = %self.name, phase, "phase started");
            busy.put(active).await?;
            tracing::info!(device = %self.name, phase, "phase complete");
        }
        Ok(())
    }

    /// Clear the softGlue buffers.
    pub async fn reset_fpga(&self) -> AppResult<()> {
        tracing::debug!(device = %self.name, "reset FPGA");
        self.reset_fpga.put(1_i64).await
    }

    /// Set the PSO gate input. The record only accepts strings.
    pub async fn set_pso_state(&self, state: &str) -> AppResult<()> {
        self.pso_state.put(state).await
    }

    /// Route softGlue input `index` (1-5) to `source`.
    pub async fn route_input(&self, index: usize, source: &str) -> AppResult<()> {
        let signal = match index {
            1 => &self.fi1_signal,
            2 => &self.fi2_signal,
            3 => &self.fi3_signal,
            4 => &self.fi4_signal,
            5 => &self.fi5_signal,
            _ => {
                return Err(DeviceError::Configuration(format!(
                    "softGlue input {} does not exist",
                    index
                )))
            }
        };
        signal.put(source).await
    }
}

#[async_trait]
impl Device for TaxiFlyScanDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn component_names(&self) -> Vec<&str> {
        vec![
            "taxi",
            "fly",
            "reset_fpga",
            "pso_state",
            "fi1_signal",
            "fi2_signal",
            "fi3_signal",
            "fi4_signal",
            "fi5_signal",
        ]
    }

    fn walk_signals(&self) -> Vec<SignalEntry<'_>> {
        signal_entries!(self;
            taxi,
            fly,
            reset_fpga,
            pso_state,
            fi1_signal,
            fi2_signal,
            fi3_signal,
            fi4_signal,
            fi5_signal,
        )
    }
}

// =============================================================================
// Aerotech Ensemble PSO fly scan
// =============================================================================

/// Trajectory of one PSO fly scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlyScanSettings {
    /// Start position
    pub start: f64,
    /// End position
    pub end: f64,
    /// Speed during the fly phase
    pub slew_speed: f64,
    /// A trigger pulse is output every time the motor moves this far
    pub scan_delta: f64,
}

/// Taxi/fly device of the Aerotech Ensemble PSO fly-scan database.
#[derive(Debug, Clone)]
pub struct EnsemblePsoFlyDevice {
    pub scan: TaxiFlyScanDevice,
    pub motor_pv_name: SignalRo,
    pub start: Signal,
    pub end: Signal,
    pub slew_speed: Signal,
    pub scan_delta: Signal,
    pub delta_time: SignalRo,
    pub detector_setup_time: Signal,
    pub pulse_type: Signal,
    pub scan_control: Signal,
}

impl EnsemblePsoFlyDevice {
    pub fn new(client: Arc<dyn ChannelAccess>, prefix: &str, name: impl Into<String>) -> Self {
        let pv = |suffix: &str| format!("{}{}", prefix, suffix);
        Self {
            scan: TaxiFlyScanDevice::new(client.clone(), prefix, name),
            motor_pv_name: SignalRo::new(client.clone(), pv("motorName")).with_kind(Kind::Config),
            start: Signal::new(client.clone(), pv("startPos")),
            end: Signal::new(client.clone(), pv("endPos")),
            slew_speed: Signal::new(client.clone(), pv("slewSpeed")),
            scan_delta: Signal::new(client.clone(), pv("scanDelta")),
            delta_time: SignalRo::new(client.clone(), pv("deltaTime")),
            detector_setup_time: Signal::new(client.clone(), pv("detSetupTime"))
                .with_kind(Kind::Config),
            pulse_type: Signal::new(client.clone(), pv("pulseType")).with_kind(Kind::Config),
            scan_control: Signal::new(client, pv("scanControl")).with_kind(Kind::Config),
        }
    }

    /// Write the trajectory.
    pub async fn configure(&self, settings: FlyScanSettings) -> AppResult<()> {
        tracing::info!(device = %self.scan.name, ?settings, "configure fly scan");
        self.start.put(settings.start).await?;
        self.end.put(settings.end).await?;
        self.slew_speed.put(settings.slew_speed).await?;
        self.scan_delta.put(settings.scan_delta).await
    }

    /// Time between trigger pulses computed by the controller.
    pub async fn delta_time(&self) -> AppResult<f64> {
        self.delta_time.get_f64().await
    }

    /// Run taxi then fly.
    pub async fn plan(&self) -> AppResult<()> {
        self.scan.plan().await
    }
}

#[async_trait]
impl Device for EnsemblePsoFlyDevice {
    fn name(&self) -> &str {
        &self.scan.name
    }

    fn prefix(&self) -> &str {
        &self.scan.prefix
    }

    fn component_names(&self) -> Vec<&str> {
        let mut names = self.scan.component_names();
        names.extend([
            "motor_pv_name",
            "start",
            "end",
            "slew_speed",
            "scan_delta",
            "delta_time",
            "detector_setup_time",
            "pulse_type",
            "scan_control",
        ]);
        names
    }

    fn walk_signals(&self) -> Vec<SignalEntry<'_>> {
        let mut entries = self.scan.walk_signals();
        entries.extend(signal_entries!(self;
            motor_pv_name,
            start,
            end,
            slew_speed,
            scan_delta,
            delta_time,
            detector_setup_time,
            pulse_type,
            scan_control,
        ));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelValue, SoftIoc};

    fn hosted() -> (SoftIoc, TaxiFlyScanDevice) {
        let ioc = SoftIoc::new();
        let device = TaxiFlyScanDevice::new(Arc::new(ioc.clone()), "6idhedms1:fly:", "flyscan");
        ioc.host(&device);
        (ioc, device)
    }

    #[tokio::test]
    async fn test_plan_completes_taxi_before_fly() {
        let (ioc, device) = hosted();

        device.plan().await.unwrap();

        let journal = ioc.journal();
        let pvs: Vec<_> = journal.iter().map(|(pv, _)| pv.as_str()).collect();
        assert_eq!(pvs, vec!["6idhedms1:fly:taxi", "6idhedms1:fly:fly"]);
        assert_eq!(journal[0].1, ChannelValue::from("Busy"));
        // Taxi was reset by the controller before fly was written
        assert_eq!(ioc.value("6idhedms1:fly:taxi"), Some(ChannelValue::from("Done")));
        assert_eq!(ioc.value("6idhedms1:fly:fly"), Some(ChannelValue::from("Done")));
    }

    #[tokio::test]
    async fn test_plan_stops_when_taxi_fails() {
        let (ioc, device) = hosted();
        ioc.set_connected("6idhedms1:fly:taxi", false);

        assert!(device.plan().await.is_err());
        assert!(ioc.puts_to("6idhedms1:fly:fly").is_empty());
    }

    #[tokio::test]
    async fn test_fpga_signals() {
        let (ioc, device) = hosted();

        device.reset_fpga().await.unwrap();
        device.set_pso_state("1").await.unwrap();
        device.route_input(3, "ENC1").await.unwrap();

        assert_eq!(ioc.puts_to(RESET_FPGA_PV), vec![ChannelValue::Long(1)]);
        assert_eq!(ioc.puts_to(PSO_STATE_PV), vec![ChannelValue::from("1")]);
        assert_eq!(
            ioc.puts_to("6idMZ1:SG:FI3_Signal"),
            vec![ChannelValue::from("ENC1")]
        );
        assert!(device.route_input(6, "ENC1").await.is_err());
    }

    #[tokio::test]
    async fn test_ensemble_configure() {
        let ioc = SoftIoc::new();
        let device = EnsemblePsoFlyDevice::new(Arc::new(ioc.clone()), "6idpso:", "psofly");
        ioc.host(&device);

        device
            .configure(FlyScanSettings {
                start: -180.0,
                end: 180.0,
                slew_speed: 5.0,
                scan_delta: 0.25,
            })
            .await
            .unwrap();

        assert_eq!(ioc.value("6idpso:startPos"), Some(ChannelValue::Double(-180.0)));
        assert_eq!(ioc.value("6idpso:scanDelta"), Some(ChannelValue::Double(0.25)));
        assert_eq!(device.component_names().len(), 18);
        assert!(ioc.contains("6idpso:taxi"));
    }
}
