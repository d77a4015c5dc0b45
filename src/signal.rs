//! Signals: components bound to a single process variable.
//!
//! - [`Signal`]: read/write PV
//! - [`SignalRo`]: read-only PV
//! - [`SignalWithRbv`]: writes `X`, reads the readback `X_RBV`
//!
//! All three implement [`ReadSignal`], the object-safe view used to walk a
//! device's components, read them generically and host them in the simulator.

use crate::channel::soft_ioc::RecordKind;
use crate::channel::{ChannelAccess, ChannelValue};
use crate::error::{AppResult, DeviceError};
use crate::status::Status;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// How a component is reported when a device is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Primary readback, shown in summaries
    Hinted,
    /// Read with every event
    Normal,
    /// Configuration, read once per run
    Config,
    /// Never read automatically
    Omitted,
}

/// A value with the time it was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: ChannelValue,
    pub timestamp: DateTime<Utc>,
}

/// Object-safe signal interface.
#[async_trait]
pub trait ReadSignal: Send + Sync {
    /// PV that is read.
    fn pvname(&self) -> &str;

    /// PV that is written, when different from the read PV.
    fn write_pvname(&self) -> Option<&str> {
        None
    }

    fn kind(&self) -> Kind;

    /// Record type hint for the simulator.
    fn record(&self) -> RecordKind {
        RecordKind::Plain
    }

    /// Read the current value.
    async fn get(&self) -> AppResult<ChannelValue>;

    /// Read the current value with a timestamp.
    async fn read(&self) -> AppResult<Reading> {
        Ok(Reading {
            value: self.get().await?,
            timestamp: Utc::now(),
        })
    }

    /// Write without knowing the concrete signal type.
    async fn write(&self, value: ChannelValue) -> AppResult<()> {
        let _ = value;
        Err(DeviceError::ReadOnly(self.pvname().to_string()))
    }
}

async fn get_f64(client: &dyn ChannelAccess, pv: &str) -> AppResult<f64> {
    let value = client.get(pv).await?;
    value.as_f64().ok_or_else(|| DeviceError::TypeMismatch {
        pv: pv.to_string(),
        expected: "number",
        found: value.type_name().to_string(),
    })
}

// =============================================================================
// Signal
// =============================================================================

/// Read/write process variable.
#[derive(Clone)]
pub struct Signal {
    client: Arc<dyn ChannelAccess>,
    pv: String,
    kind: Kind,
    record: RecordKind,
    put_complete: bool,
}

impl Signal {
    pub fn new(client: Arc<dyn ChannelAccess>, pv: impl Into<String>) -> Self {
        Self {
            client,
            pv: pv.into(),
            kind: Kind::Normal,
            record: RecordKind::Plain,
            put_complete: false,
        }
    }

    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_record(mut self, record: RecordKind) -> Self {
        self.record = record;
        self
    }

    /// Make every `put` wait for the record to finish processing.
    pub fn with_put_complete(mut self, put_complete: bool) -> Self {
        self.put_complete = put_complete;
        self
    }

    /// Write a value. Waits for completion when the signal is put-complete.
    pub async fn put(&self, value: impl Into<ChannelValue>) -> AppResult<()> {
        let value = value.into();
        tracing::debug!(pv = %self.pv, %value, "put");
        if self.put_complete {
            self.client.put_wait(&self.pv, value).await
        } else {
            self.client.put(&self.pv, value).await
        }
    }

    /// Start a completion put and return its status without waiting.
    pub fn set(&self, value: impl Into<ChannelValue>) -> Status {
        let value = value.into();
        let client = Arc::clone(&self.client);
        let pv = self.pv.clone();
        tracing::debug!(pv = %pv, %value, "set");
        Status::spawn(self.pv.clone(), async move { client.put_wait(&pv, value).await })
    }

    /// Read as a float.
    pub async fn get_f64(&self) -> AppResult<f64> {
        get_f64(self.client.as_ref(), &self.pv).await
    }

    /// State names of the underlying enumerated record.
    pub async fn enum_strings(&self) -> AppResult<Vec<String>> {
        self.client.enum_strings(&self.pv).await
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("pv", &self.pv)
            .field("kind", &self.kind)
            .finish()
    }
}

#[async_trait]
impl ReadSignal for Signal {
    fn pvname(&self) -> &str {
        &self.pv
    }

    fn kind(&self) -> Kind {
        self.kind
    }

    fn record(&self) -> RecordKind {
        self.record
    }

    async fn get(&self) -> AppResult<ChannelValue> {
        self.client.get(&self.pv).await
    }

    async fn write(&self, value: ChannelValue) -> AppResult<()> {
        self.put(value).await
    }
}

// =============================================================================
// SignalRo
// =============================================================================

/// Read-only process variable.
#[derive(Clone)]
pub struct SignalRo {
    client: Arc<dyn ChannelAccess>,
    pv: String,
    kind: Kind,
}

impl SignalRo {
    pub fn new(client: Arc<dyn ChannelAccess>, pv: impl Into<String>) -> Self {
        Self {
            client,
            pv: pv.into(),
            kind: Kind::Normal,
        }
    }

    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Read as a float.
    pub async fn get_f64(&self) -> AppResult<f64> {
        get_f64(self.client.as_ref(), &self.pv).await
    }
}

impl fmt::Debug for SignalRo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRo").field("pv", &self.pv).finish()
    }
}

#[async_trait]
impl ReadSignal for SignalRo {
    fn pvname(&self) -> &str {
        &self.pv
    }

    fn kind(&self) -> Kind {
        self.kind
    }

    async fn get(&self) -> AppResult<ChannelValue> {
        self.client.get(&self.pv).await
    }
}

// =============================================================================
// SignalWithRbv
// =============================================================================

/// Setpoint PV `X` paired with readback PV `X_RBV`.
#[derive(Clone)]
pub struct SignalWithRbv {
    client: Arc<dyn ChannelAccess>,
    write_pv: String,
    read_pv: String,
    kind: Kind,
    record: RecordKind,
}

impl SignalWithRbv {
    /// `pv` is the setpoint; the readback is `pv` + `_RBV`.
    pub fn new(client: Arc<dyn ChannelAccess>, pv: impl Into<String>) -> Self {
        let write_pv = pv.into();
        Self {
            client,
            read_pv: format!("{}_RBV", write_pv),
            write_pv,
            kind: Kind::Config,
            record: RecordKind::Plain,
        }
    }

    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_record(mut self, record: RecordKind) -> Self {
        self.record = record;
        self
    }

    /// Write the setpoint.
    pub async fn put(&self, value: impl Into<ChannelValue>) -> AppResult<()> {
        let value = value.into();
        tracing::debug!(pv = %self.write_pv, %value, "put");
        self.client.put(&self.write_pv, value).await
    }

    /// Write the setpoint and wait for processing to finish.
    pub async fn put_wait(&self, value: impl Into<ChannelValue>) -> AppResult<()> {
        let value = value.into();
        tracing::debug!(pv = %self.write_pv, %value, "put (wait)");
        self.client.put_wait(&self.write_pv, value).await
    }

    /// Start a completion put on the setpoint and return its status.
    pub fn set(&self, value: impl Into<ChannelValue>) -> Status {
        let value = value.into();
        let client = Arc::clone(&self.client);
        let pv = self.write_pv.clone();
        Status::spawn(self.write_pv.clone(), async move {
            client.put_wait(&pv, value).await
        })
    }

    /// Read the readback as a float.
    pub async fn get_f64(&self) -> AppResult<f64> {
        get_f64(self.client.as_ref(), &self.read_pv).await
    }

    /// Setpoint PV name.
    pub fn setpoint_pvname(&self) -> &str {
        &self.write_pv
    }
}

impl fmt::Debug for SignalWithRbv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalWithRbv")
            .field("pv", &self.write_pv)
            .finish()
    }
}

#[async_trait]
impl ReadSignal for SignalWithRbv {
    fn pvname(&self) -> &str {
        &self.read_pv
    }

    fn write_pvname(&self) -> Option<&str> {
        Some(&self.write_pv)
    }

    fn kind(&self) -> Kind {
        self.kind
    }

    fn record(&self) -> RecordKind {
        self.record
    }

    async fn get(&self) -> AppResult<ChannelValue> {
        self.client.get(&self.read_pv).await
    }

    async fn write(&self, value: ChannelValue) -> AppResult<()> {
        self.put(value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SoftIoc;

    fn ioc() -> (SoftIoc, Arc<dyn ChannelAccess>) {
        let ioc = SoftIoc::new();
        let client: Arc<dyn ChannelAccess> = Arc::new(ioc.clone());
        (ioc, client)
    }

    #[tokio::test]
    async fn test_signal_put_and_get() {
        let (ioc, client) = ioc();
        ioc.add_pv("6idMZ1:SG:FI1_Signal", "");
        let signal = Signal::new(client, "6idMZ1:SG:FI1_Signal");

        signal.put("ENC1").await.unwrap();

        assert_eq!(signal.get().await.unwrap(), ChannelValue::from("ENC1"));
        assert_eq!(ioc.journal().len(), 1);
    }

    #[tokio::test]
    async fn test_signal_with_rbv_reads_readback() {
        let (ioc, client) = ioc();
        ioc.add_pv("det:cam1:AcquireTime", 0.0);
        ioc.add_pv("det:cam1:AcquireTime_RBV", 0.0);
        let signal = SignalWithRbv::new(client, "det:cam1:AcquireTime");

        assert_eq!(signal.pvname(), "det:cam1:AcquireTime_RBV");
        assert_eq!(signal.write_pvname(), Some("det:cam1:AcquireTime"));

        signal.put(0.1).await.unwrap();
        assert_eq!(signal.get_f64().await.unwrap(), 0.1);
        assert_eq!(ioc.puts_to("det:cam1:AcquireTime"), vec![ChannelValue::Double(0.1)]);
    }

    #[tokio::test]
    async fn test_read_only_signal_rejects_write() {
        let (ioc, client) = ioc();
        ioc.add_pv("fly:deltaTime", 0.002);
        let signal = SignalRo::new(client, "fly:deltaTime");

        let result = signal.write(ChannelValue::Double(1.0)).await;
        assert!(matches!(result, Err(DeviceError::ReadOnly(_))));
        assert_eq!(signal.get_f64().await.unwrap(), 0.002);
    }

    #[tokio::test]
    async fn test_get_f64_type_mismatch() {
        let (ioc, client) = ioc();
        ioc.add_pv("m1.EGU", "mm");
        let signal = SignalRo::new(client, "m1.EGU");

        assert!(matches!(
            signal.get_f64().await,
            Err(DeviceError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_returns_waitable_status() {
        let (ioc, client) = ioc();
        ioc.add_motor("m1", 0.0);
        ioc.set("m1.VELO", 1000.0);
        let setpoint = Signal::new(client, "m1.VAL");

        setpoint.set(1.0).wait().await.unwrap();

        assert_eq!(ioc.value("m1.RBV"), Some(ChannelValue::Double(1.0)));
    }
}
