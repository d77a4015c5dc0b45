//! Control-System Channel Boundary
//!
//! Every device in this crate talks to hardware exclusively through process
//! variables (PVs): named, network-addressable control points. This module
//! defines the boundary to the control-system client as the [`ChannelAccess`]
//! trait. Connection management, subscriptions and completion callbacks belong
//! to the client; devices only compose PV names and issue gets and puts.
//!
//! A PV name is always `prefix + suffix`, where the prefix is supplied when the
//! device is instantiated and the suffix is declared by the component.
//!
//! [`soft_ioc::SoftIoc`] is an in-memory implementation used for simulation
//! and tests.

pub mod soft_ioc;

pub use soft_ioc::SoftIoc;

use crate::error::{AppResult, DeviceError};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Value carried by a process variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelValue {
    /// Floating point (ai/ao, motor fields)
    Double(f64),
    /// Integer (longin/longout, enum index)
    Long(i64),
    /// String or enum state name
    Text(String),
}

impl ChannelValue {
    /// Interpret the value as a float. Text values are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ChannelValue::Double(v) => Some(*v),
            ChannelValue::Long(v) => Some(*v as f64),
            ChannelValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Interpret the value as an integer. Doubles are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ChannelValue::Double(v) => Some(*v as i64),
            ChannelValue::Long(v) => Some(*v),
            ChannelValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Borrow the string payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ChannelValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ChannelValue::Double(_) => "double",
            ChannelValue::Long(_) => "long",
            ChannelValue::Text(_) => "string",
        }
    }
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelValue::Double(v) => write!(f, "{}", v),
            ChannelValue::Long(v) => write!(f, "{}", v),
            ChannelValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for ChannelValue {
    fn from(v: f64) -> Self {
        ChannelValue::Double(v)
    }
}

impl From<i64> for ChannelValue {
    fn from(v: i64) -> Self {
        ChannelValue::Long(v)
    }
}

impl From<i32> for ChannelValue {
    fn from(v: i32) -> Self {
        ChannelValue::Long(v.into())
    }
}

impl From<u32> for ChannelValue {
    fn from(v: u32) -> Self {
        ChannelValue::Long(v.into())
    }
}

impl From<&str> for ChannelValue {
    fn from(v: &str) -> Self {
        ChannelValue::Text(v.to_string())
    }
}

impl From<String> for ChannelValue {
    fn from(v: String) -> Self {
        ChannelValue::Text(v)
    }
}

/// Control-system client boundary.
///
/// # Contract
/// - `put` returns once the write is accepted, not when the record finishes
/// - `put_wait` returns once the record finishes processing (put-callback)
/// - `enum_strings` lists the state names of an enumerated record in index order
/// - Implementations own all connection state; methods take `&self`
#[async_trait]
pub trait ChannelAccess: Send + Sync {
    /// Read the current value of `pv`.
    async fn get(&self, pv: &str) -> AppResult<ChannelValue>;

    /// Write `value` to `pv` without waiting for processing to finish.
    async fn put(&self, pv: &str, value: ChannelValue) -> AppResult<()>;

    /// Write `value` to `pv` and wait for the completion callback.
    async fn put_wait(&self, pv: &str, value: ChannelValue) -> AppResult<()>;

    /// State names of an enumerated record.
    async fn enum_strings(&self, pv: &str) -> AppResult<Vec<String>> {
        Err(DeviceError::channel(pv, "enum strings not supported"))
    }
}

/// Full PV address for a component: instance prefix followed by the suffix.
pub fn pv_name(prefix: &str, suffix: &str) -> String {
    format!("{}{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pv_name_concatenates() {
        assert_eq!(pv_name("1idPG4:", "cam1:"), "1idPG4:cam1:");
        assert_eq!(pv_name("", "6idhedm:m48"), "6idhedm:m48");
    }

    #[test]
    fn test_channel_value_conversions() {
        assert_eq!(ChannelValue::from(2_i32).as_f64(), Some(2.0));
        assert_eq!(ChannelValue::Double(3.7).as_i64(), Some(3));
        assert_eq!(ChannelValue::from(" 1.5 ").as_f64(), Some(1.5));
        assert_eq!(ChannelValue::from("Busy").as_text(), Some("Busy"));
        assert_eq!(ChannelValue::Long(1).as_text(), None);
    }

    #[test]
    fn test_channel_value_serializes_bare() {
        assert_eq!(serde_json::to_string(&ChannelValue::Long(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&ChannelValue::Double(1.5)).unwrap(), "1.5");
        assert_eq!(
            serde_json::to_string(&ChannelValue::from("Busy")).unwrap(),
            "\"Busy\""
        );
    }
}
