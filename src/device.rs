//! Devices: named collections of components bound to process variables.
//!
//! A device is created once with a PV prefix and a name and lives for the
//! whole process. Its components are declared as struct fields; each knows its
//! full PV name. [`Device::walk_signals`] flattens the component tree into
//! dotted attribute names (`cam1.acquire_time`) so generic code can read,
//! describe or host every PV of a device.

use crate::error::AppResult;
use crate::hardware::capabilities::Positioner;
use crate::signal::{Kind, ReadSignal, Reading, Signal, SignalRo, SignalWithRbv};
use async_trait::async_trait;
use serde::Serialize;

/// One signal in a flattened device tree.
pub struct SignalEntry<'a> {
    /// Dotted attribute path relative to the device
    pub name: String,
    pub signal: &'a dyn ReadSignal,
}

impl<'a> SignalEntry<'a> {
    pub fn new(name: impl Into<String>, signal: &'a dyn ReadSignal) -> Self {
        Self {
            name: name.into(),
            signal,
        }
    }
}

/// Static description of one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentDescription {
    pub name: String,
    pub pv: String,
    pub kind: Kind,
}

/// A read value together with where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct SignalReading {
    pub name: String,
    pub pv: String,
    pub reading: Reading,
}

/// Build `SignalEntry`s for the listed signal fields of `self`.
macro_rules! signal_entries {
    ($self:ident; $($field:ident),* $(,)?) => {
        vec![$($crate::device::SignalEntry::new(stringify!($field), &$self.$field)),*]
    };
}
pub(crate) use signal_entries;

/// Prefix the entries of a sub-device with its attribute name.
pub fn nest<'a>(attr: &str, entries: Vec<SignalEntry<'a>>) -> Vec<SignalEntry<'a>> {
    entries
        .into_iter()
        .map(|entry| SignalEntry {
            name: if entry.name.is_empty() {
                attr.to_string()
            } else {
                format!("{}.{}", attr, entry.name)
            },
            signal: entry.signal,
        })
        .collect()
}

/// A named collection of PV-bound components.
#[async_trait]
pub trait Device: Send + Sync {
    /// Instance name given at construction.
    fn name(&self) -> &str;

    /// PV prefix given at construction.
    fn prefix(&self) -> &str;

    /// Top-level component attribute names, in declaration order.
    fn component_names(&self) -> Vec<&str>;

    /// Every signal of the device, depth first.
    fn walk_signals(&self) -> Vec<SignalEntry<'_>>;

    /// Name, PV and kind of every signal.
    fn describe(&self) -> Vec<ComponentDescription> {
        self.walk_signals()
            .into_iter()
            .map(|entry| ComponentDescription {
                pv: entry.signal.pvname().to_string(),
                kind: entry.signal.kind(),
                name: entry.name,
            })
            .collect()
    }

    /// Read every signal that is not omitted.
    async fn read_all(&self) -> AppResult<Vec<SignalReading>> {
        let mut readings = Vec::new();
        for entry in self.walk_signals() {
            if entry.signal.kind() == Kind::Omitted {
                continue;
            }
            readings.push(SignalReading {
                pv: entry.signal.pvname().to_string(),
                reading: entry.signal.read().await?,
                name: entry.name,
            });
        }
        Ok(readings)
    }
}

/// A component that can sit inside a motor bundle.
///
/// Capability probing: only components that move report a positioner.
pub trait Component: Send + Sync {
    /// Signals of this component; a bare signal reports one unnamed entry.
    fn signals(&self) -> Vec<SignalEntry<'_>>;

    /// PV shown in summaries.
    fn address(&self) -> &str;

    fn as_positioner(&self) -> Option<&dyn Positioner> {
        None
    }
}

impl Component for Signal {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        vec![SignalEntry::new("", self)]
    }

    fn address(&self) -> &str {
        ReadSignal::pvname(self)
    }
}

impl Component for SignalRo {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        vec![SignalEntry::new("", self)]
    }

    fn address(&self) -> &str {
        ReadSignal::pvname(self)
    }
}

impl Component for SignalWithRbv {
    fn signals(&self) -> Vec<SignalEntry<'_>> {
        vec![SignalEntry::new("", self)]
    }

    fn address(&self) -> &str {
        ReadSignal::pvname(self)
    }
}
