//! In-Memory Soft IOC
//!
//! Provides a simulated control-system server for running devices without
//! hardware. All timing uses `tokio::time::sleep`, never `std::thread::sleep`.
//!
//! # Record Behaviors
//!
//! - Plain records store whatever is written; writing `X` also updates `X_RBV`
//!   when that readback exists
//! - Enum records accept a state name or an index and always read back the name
//! - Motor records: writing `.VAL` animates `.RBV` toward the target at `.VELO`
//!   (units/sec), holding `.DMOV` at 0 until motion ends; writing `.STOP` halts
//! - Busy records: a completion put of the active state returns once the
//!   simulated external controller resets the record to `Done`
//! - Acquire records: writing 1 acquires `AcquireTime` x frames, bumps
//!   `ArrayCounter_RBV` and resets `Acquire` to 0 (continuous mode runs until 0
//!   is written)
//!
//! Every put is appended to a journal so callers can check write order.
//!
//! # Example
//!
//! ```rust,ignore
//! let ioc = SoftIoc::new();
//! ioc.add_motor("6idhedm:m48", 1.5);
//! ioc.put_wait("6idhedm:m48.VAL", 2.0.into()).await?;
//! assert_eq!(ioc.value("6idhedm:m48.RBV"), Some(ChannelValue::Double(2.0)));
//! ```

use crate::channel::{ChannelAccess, ChannelValue};
use crate::device::Device;
use crate::error::{AppResult, DeviceError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Record type hint declared by a component.
///
/// Only the simulator interprets it; a real client ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Analog or string record
    Plain,
    /// Enumerated record with the given state names
    Enum(&'static [&'static str]),
    /// Busy record driven by an external sequencer
    Busy,
    /// Motor record setpoint field (`.VAL`)
    MotorSetpoint,
    /// Area detector `Acquire` control
    Acquire,
}

/// State names of a busy record.
pub const BUSY_STATES: &[&str] = &["Done", "Busy"];

const MOTOR_FIELDS: &[(&str, f64)] = &[
    (".VELO", 10.0),
    (".HLM", 0.0),
    (".LLM", 0.0),
    (".STOP", 0.0),
];

/// Motion is animated in this many increments.
const MOTION_STEPS: u32 = 20;

#[derive(Debug, Clone)]
enum Behavior {
    Plain,
    Motor { base: String },
    MotorStop { base: String },
    Busy,
    Acquire { cam: String },
}

#[derive(Debug, Clone)]
struct Record {
    value: ChannelValue,
    states: Option<Vec<String>>,
    behavior: Behavior,
    connected: bool,
}

impl Record {
    fn plain(value: ChannelValue) -> Self {
        Self {
            value,
            states: None,
            behavior: Behavior::Plain,
            connected: true,
        }
    }
}

#[derive(Debug, Default)]
struct IocState {
    records: HashMap<String, Record>,
    journal: Vec<(String, ChannelValue)>,
    stop_requested: HashMap<String, bool>,
}

/// Simulated IOC serving process variables from memory.
///
/// Cheap to clone; clones share the same record database.
#[derive(Debug, Clone)]
pub struct SoftIoc {
    state: Arc<Mutex<IocState>>,
    busy_time: Duration,
}

impl SoftIoc {
    /// Create an empty IOC. Busy records reset after 10ms.
    pub fn new() -> Self {
        Self::with_busy_time(Duration::from_millis(10))
    }

    /// Create an IOC whose busy records take `busy_time` to complete.
    pub fn with_busy_time(busy_time: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(IocState::default())),
            busy_time,
        }
    }

    /// Add (or overwrite) a plain record.
    pub fn add_pv(&self, pv: impl Into<String>, value: impl Into<ChannelValue>) {
        self.state
            .lock()
            .records
            .insert(pv.into(), Record::plain(value.into()));
    }

    /// Add an enumerated record holding `states[initial]`.
    pub fn add_enum(&self, pv: impl Into<String>, states: &[&str], initial: usize) {
        let value = states
            .get(initial)
            .map(|s| ChannelValue::Text((*s).to_string()))
            .unwrap_or(ChannelValue::Long(initial as i64));
        let record = Record {
            value,
            states: Some(states.iter().map(|s| (*s).to_string()).collect()),
            behavior: Behavior::Plain,
            connected: true,
        };
        self.state.lock().records.insert(pv.into(), record);
    }

    /// Add a busy record (`Done`/`Busy`).
    pub fn add_busy(&self, pv: impl Into<String>) {
        let record = Record {
            value: ChannelValue::Text(BUSY_STATES[0].to_string()),
            states: Some(BUSY_STATES.iter().map(|s| (*s).to_string()).collect()),
            behavior: Behavior::Busy,
            connected: true,
        };
        self.state.lock().records.insert(pv.into(), record);
    }

    /// Add a motor record at `base` sitting at `position`.
    ///
    /// Fields already present are left untouched.
    pub fn add_motor(&self, base: &str, position: f64) {
        let mut state = self.state.lock();
        let records = &mut state.records;
        let mut ensure = |suffix: &str, value: ChannelValue, behavior: Behavior| {
            records
                .entry(format!("{}{}", base, suffix))
                .or_insert_with(|| Record {
                    value,
                    states: None,
                    behavior,
                    connected: true,
                });
        };
        ensure(
            ".VAL",
            position.into(),
            Behavior::Motor {
                base: base.to_string(),
            },
        );
        ensure(".RBV", position.into(), Behavior::Plain);
        ensure(".DVAL", position.into(), Behavior::Plain);
        ensure(".DRBV", position.into(), Behavior::Plain);
        ensure(".DMOV", ChannelValue::Long(1), Behavior::Plain);
        ensure(".EGU", "mm".into(), Behavior::Plain);
        for (suffix, value) in MOTOR_FIELDS {
            let behavior = if *suffix == ".STOP" {
                Behavior::MotorStop {
                    base: base.to_string(),
                }
            } else {
                Behavior::Plain
            };
            ensure(suffix, (*value).into(), behavior);
        }
    }

    /// Add the acquire control records of an area detector camera.
    ///
    /// `cam` is the full camera prefix, e.g. `"1idPG4:cam1:"`.
    pub fn add_acquire(&self, cam: &str) {
        let mut state = self.state.lock();
        let records = &mut state.records;
        records.insert(
            format!("{}Acquire", cam),
            Record {
                value: ChannelValue::Long(0),
                states: None,
                behavior: Behavior::Acquire {
                    cam: cam.to_string(),
                },
                connected: true,
            },
        );
        for (suffix, value) in [
            ("Acquire_RBV", ChannelValue::Long(0)),
            ("AcquireTime", ChannelValue::Double(0.0)),
            ("NumImages", ChannelValue::Long(1)),
            ("ArrayCounter_RBV", ChannelValue::Long(0)),
        ] {
            records
                .entry(format!("{}{}", cam, suffix))
                .or_insert_with(|| Record::plain(value));
        }
        records
            .entry(format!("{}ImageMode", cam))
            .or_insert_with(|| Record {
                value: ChannelValue::Text("Single".to_string()),
                states: Some(
                    ["Single", "Multiple", "Continuous"]
                        .iter()
                        .map(|s| (*s).to_string())
                        .collect(),
                ),
                behavior: Behavior::Plain,
                connected: true,
            });
    }

    /// Serve every PV a device declares.
    ///
    /// Existing records keep their values; missing ones are created from the
    /// component's record hint.
    pub fn host(&self, device: &dyn Device) {
        let mut pvs: Vec<(String, RecordKind)> = Vec::new();
        for entry in device.walk_signals() {
            let signal = entry.signal;
            pvs.push((signal.pvname().to_string(), signal.record()));
            if let Some(write_pv) = signal.write_pvname() {
                pvs.push((write_pv.to_string(), signal.record()));
            }
        }
        // Structured records first so their fields get proper defaults
        pvs.sort_by_key(|(_, kind)| *kind == RecordKind::Plain);

        for (pv, kind) in pvs {
            match kind {
                RecordKind::MotorSetpoint => {
                    let base = pv.strip_suffix(".VAL").unwrap_or(&pv).to_string();
                    self.add_motor(&base, 0.0);
                }
                RecordKind::Acquire => {
                    let cam = pv
                        .strip_suffix("Acquire")
                        .or_else(|| pv.strip_suffix("Acquire_RBV"))
                        .unwrap_or(&pv)
                        .to_string();
                    if !self.contains(&format!("{}Acquire", cam)) {
                        self.add_acquire(&cam);
                    }
                }
                RecordKind::Busy => {
                    if !self.contains(&pv) {
                        self.add_busy(pv);
                    }
                }
                RecordKind::Enum(states) => {
                    if !self.contains(&pv) {
                        self.add_enum(pv, states, 0);
                    }
                }
                RecordKind::Plain => {
                    if !self.contains(&pv) {
                        self.add_pv(pv, 0.0);
                    }
                }
            }
        }
    }

    /// Check whether a record exists.
    pub fn contains(&self, pv: &str) -> bool {
        self.state.lock().records.contains_key(pv)
    }

    /// Current value of a record, bypassing connection state.
    pub fn value(&self, pv: &str) -> Option<ChannelValue> {
        self.state.lock().records.get(pv).map(|r| r.value.clone())
    }

    /// Overwrite a record value directly, as another client or the IOC would.
    ///
    /// Not journaled and bypasses record behavior.
    pub fn set(&self, pv: &str, value: impl Into<ChannelValue>) {
        if let Some(record) = self.state.lock().records.get_mut(pv) {
            record.value = value.into();
        }
    }

    /// Mark a record connected or disconnected.
    pub fn set_connected(&self, pv: &str, connected: bool) {
        if let Some(record) = self.state.lock().records.get_mut(pv) {
            record.connected = connected;
        }
    }

    /// All puts received so far, in order.
    pub fn journal(&self) -> Vec<(String, ChannelValue)> {
        self.state.lock().journal.clone()
    }

    /// Values written to a single PV, in order.
    pub fn puts_to(&self, pv: &str) -> Vec<ChannelValue> {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|(name, _)| name == pv)
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Forget the put journal.
    pub fn clear_journal(&self) {
        self.state.lock().journal.clear();
    }

    fn number(&self, pv: &str) -> Option<f64> {
        self.value(pv).and_then(|v| v.as_f64())
    }

    /// Store a value, applying enum and readback rules. Returns the behavior
    /// of the record so the caller can run its side effects.
    fn store(&self, pv: &str, value: ChannelValue) -> AppResult<Behavior> {
        let mut state = self.state.lock();
        let record = state
            .records
            .get_mut(pv)
            .ok_or_else(|| DeviceError::UnknownChannel(pv.to_string()))?;
        if !record.connected {
            return Err(DeviceError::channel(pv, "disconnected"));
        }
        let value = match &record.states {
            Some(states) => resolve_state(pv, states, value)?,
            None => value,
        };
        record.value = value.clone();
        let behavior = record.behavior.clone();
        let rbv = format!("{}_RBV", pv);
        if let Some(readback) = state.records.get_mut(&rbv) {
            readback.value = value.clone();
        }
        state.journal.push((pv.to_string(), value));
        Ok(behavior)
    }

    async fn run_motion(&self, base: String, target: f64) {
        let rbv = format!("{}.RBV", base);
        let dmov = format!("{}.DMOV", base);
        let start = self.number(&rbv).unwrap_or(0.0);
        let velocity = self.number(&format!("{}.VELO", base)).unwrap_or(0.0);
        let distance = (target - start).abs();

        self.state.lock().stop_requested.insert(base.clone(), false);
        self.set(&dmov, 0_i64);
        tracing::debug!(motor = %base, start, target, "soft motor moving");

        if velocity > 0.0 && distance > 0.0 {
            let step_time = Duration::from_secs_f64(distance / velocity / MOTION_STEPS as f64);
            for step in 1..=MOTION_STEPS {
                sleep(step_time).await;
                if self
                    .state
                    .lock()
                    .stop_requested
                    .get(&base)
                    .copied()
                    .unwrap_or(false)
                {
                    let here = self.number(&rbv).unwrap_or(start);
                    self.set(&format!("{}.VAL", base), here);
                    break;
                }
                let fraction = step as f64 / MOTION_STEPS as f64;
                self.set(&rbv, start + (target - start) * fraction);
            }
        } else {
            self.set(&rbv, target);
        }

        let reached = self.number(&rbv).unwrap_or(target);
        self.set(&format!("{}.DRBV", base), reached);
        self.set(&dmov, 1_i64);
        tracing::debug!(motor = %base, position = reached, "soft motor done");
    }

    async fn run_busy(&self, pv: String) {
        sleep(self.busy_time).await;
        self.set(&pv, BUSY_STATES[0]);
    }

    /// Acquire frames; `None` means run until stopped.
    fn frames_for(&self, cam: &str) -> Option<i64> {
        let mode = self
            .value(&format!("{}ImageMode", cam))
            .map(|v| v.to_string())
            .unwrap_or_default();
        match mode.as_str() {
            "Continuous" | "2" => None,
            "Multiple" | "1" => Some(
                self.value(&format!("{}NumImages", cam))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(1),
            ),
            _ => Some(1),
        }
    }

    async fn run_acquire(&self, cam: String, frames: i64) {
        let exposure = self.number(&format!("{}AcquireTime", cam)).unwrap_or(0.0);
        let counter = format!("{}ArrayCounter_RBV", cam);
        for _ in 0..frames.max(0) {
            sleep(Duration::from_secs_f64(exposure.max(0.0))).await;
            let count = self.value(&counter).and_then(|v| v.as_i64()).unwrap_or(0);
            self.set(&counter, count + 1);
            // Stopped from outside
            if self
                .value(&format!("{}Acquire", cam))
                .and_then(|v| v.as_i64())
                == Some(0)
            {
                break;
            }
        }
        self.set(&format!("{}Acquire", cam), 0_i64);
        self.set(&format!("{}Acquire_RBV", cam), 0_i64);
    }

    /// Run the side effect of a write. With `wait`, return once it finishes.
    async fn process(&self, pv: &str, behavior: Behavior, value: &ChannelValue, wait: bool) {
        match behavior {
            Behavior::Plain => {}
            Behavior::Motor { base } => {
                let target = value.as_f64().unwrap_or(0.0);
                if wait {
                    self.run_motion(base, target).await;
                } else {
                    let ioc = self.clone();
                    tokio::spawn(async move { ioc.run_motion(base, target).await });
                }
            }
            Behavior::MotorStop { base } => {
                if value.as_i64().unwrap_or(0) != 0 {
                    self.state.lock().stop_requested.insert(base, true);
                }
            }
            Behavior::Busy => {
                let active = value.as_text() == Some(BUSY_STATES[1]);
                if !active {
                    return;
                }
                if wait {
                    self.run_busy(pv.to_string()).await;
                } else {
                    let ioc = self.clone();
                    let pv = pv.to_string();
                    tokio::spawn(async move { ioc.run_busy(pv).await });
                }
            }
            Behavior::Acquire { cam } => {
                if value.as_i64().unwrap_or(0) == 0 {
                    return;
                }
                match self.frames_for(&cam) {
                    Some(frames) if wait => self.run_acquire(cam, frames).await,
                    Some(frames) => {
                        let ioc = self.clone();
                        tokio::spawn(async move { ioc.run_acquire(cam, frames).await });
                    }
                    // Continuous: stays acquiring until 0 is written
                    None => {}
                }
            }
        }
    }
}

impl Default for SoftIoc {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_state(pv: &str, states: &[String], value: ChannelValue) -> AppResult<ChannelValue> {
    match &value {
        ChannelValue::Text(name) => {
            if states.iter().any(|s| s == name) {
                Ok(value)
            } else {
                Err(DeviceError::channel(
                    pv,
                    format!("'{}' is not one of {:?}", name, states),
                ))
            }
        }
        other => {
            let index = other.as_i64().unwrap_or(-1);
            usize::try_from(index)
                .ok()
                .and_then(|i| states.get(i))
                .map(|s| ChannelValue::Text(s.clone()))
                .ok_or_else(|| DeviceError::channel(pv, format!("enum index {} out of range", index)))
        }
    }
}

#[async_trait]
impl ChannelAccess for SoftIoc {
    async fn get(&self, pv: &str) -> AppResult<ChannelValue> {
        let state = self.state.lock();
        let record = state
            .records
            .get(pv)
            .ok_or_else(|| DeviceError::UnknownChannel(pv.to_string()))?;
        if !record.connected {
            return Err(DeviceError::channel(pv, "disconnected"));
        }
        Ok(record.value.clone())
    }

    async fn put(&self, pv: &str, value: ChannelValue) -> AppResult<()> {
        let behavior = self.store(pv, value.clone())?;
        self.process(pv, behavior, &value, false).await;
        Ok(())
    }

    async fn put_wait(&self, pv: &str, value: ChannelValue) -> AppResult<()> {
        let behavior = self.store(pv, value.clone())?;
        self.process(pv, behavior, &value, true).await;
        Ok(())
    }

    async fn enum_strings(&self, pv: &str) -> AppResult<Vec<String>> {
        let state = self.state.lock();
        let record = state
            .records
            .get(pv)
            .ok_or_else(|| DeviceError::UnknownChannel(pv.to_string()))?;
        record
            .states
            .clone()
            .ok_or_else(|| DeviceError::channel(pv, "not an enumerated record"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_record_updates_readback() {
        let ioc = SoftIoc::new();
        ioc.add_pv("det:cam1:AcquireTime", 0.0);
        ioc.add_pv("det:cam1:AcquireTime_RBV", 0.0);

        ioc.put("det:cam1:AcquireTime", 0.25.into()).await.unwrap();

        assert_eq!(
            ioc.get("det:cam1:AcquireTime_RBV").await.unwrap(),
            ChannelValue::Double(0.25)
        );
        assert_eq!(ioc.journal().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_disconnected_channels() {
        let ioc = SoftIoc::new();
        assert!(matches!(
            ioc.get("nope").await,
            Err(DeviceError::UnknownChannel(_))
        ));

        ioc.add_pv("x", 1.0);
        ioc.set_connected("x", false);
        assert!(matches!(ioc.get("x").await, Err(DeviceError::Channel { .. })));
        assert!(ioc.put("x", 2.0.into()).await.is_err());
    }

    #[tokio::test]
    async fn test_enum_record_resolves_index_and_rejects_unknown_state() {
        let ioc = SoftIoc::new();
        ioc.add_enum("mode", &["Single", "Multiple", "Continuous"], 0);

        ioc.put("mode", ChannelValue::Long(2)).await.unwrap();
        assert_eq!(ioc.value("mode"), Some(ChannelValue::from("Continuous")));

        assert!(ioc.put("mode", "Sometimes".into()).await.is_err());
        assert!(ioc.put("mode", ChannelValue::Long(7)).await.is_err());
    }

    #[tokio::test]
    async fn test_motor_put_wait_reaches_target() {
        let ioc = SoftIoc::new();
        ioc.add_motor("m1", 0.0);
        ioc.set("m1.VELO", 1000.0);

        ioc.put_wait("m1.VAL", 2.5.into()).await.unwrap();

        assert_eq!(ioc.value("m1.RBV"), Some(ChannelValue::Double(2.5)));
        assert_eq!(ioc.value("m1.DMOV"), Some(ChannelValue::Long(1)));
    }

    #[tokio::test]
    async fn test_busy_record_resets_after_completion() {
        let ioc = SoftIoc::new();
        ioc.add_busy("fly:taxi");

        ioc.put_wait("fly:taxi", "Busy".into()).await.unwrap();

        assert_eq!(ioc.value("fly:taxi"), Some(ChannelValue::from("Done")));
        assert_eq!(ioc.puts_to("fly:taxi"), vec![ChannelValue::from("Busy")]);
        assert_eq!(
            ioc.enum_strings("fly:taxi").await.unwrap(),
            vec!["Done".to_string(), "Busy".to_string()]
        );
    }

    #[tokio::test]
    async fn test_acquire_counts_frames() {
        let ioc = SoftIoc::new();
        ioc.add_acquire("det:cam1:");
        ioc.put("det:cam1:ImageMode", "Multiple".into()).await.unwrap();
        ioc.put("det:cam1:NumImages", 3_i64.into()).await.unwrap();

        ioc.put_wait("det:cam1:Acquire", 1_i64.into()).await.unwrap();

        assert_eq!(
            ioc.value("det:cam1:ArrayCounter_RBV"),
            Some(ChannelValue::Long(3))
        );
        assert_eq!(ioc.value("det:cam1:Acquire"), Some(ChannelValue::Long(0)));
    }
}
