//! Motor bundles: named groups of axes that can remember where they were.
//!
//! A bundle is the device behind every sample and camera stage. Besides
//! grouping its motors it offers a position cache:
//!
//! ```rust,ignore
//! tomostage.bundle().cache_position().await?;
//! // ... move things around for an alignment scan ...
//! tomostage.bundle().resume_position().await?; // all axes move back together
//! ```
//!
//! Only components that expose [`Positioner`] take part; other components are
//! skipped when caching. The cache is consumed by a successful call to
//! `resume_position`.

use crate::device::{nest, Component, Device, SignalEntry};
use crate::error::{AppResult, DeviceError};
use crate::hardware::capabilities::Positioner;
use crate::status::Status;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// A named, ordered group of components.
pub struct MotorBundle {
    name: String,
    prefix: String,
    components: Vec<(String, Arc<dyn Component>)>,
    cache: Mutex<Option<Vec<(String, f64)>>>,
}

impl MotorBundle {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            components: Vec::new(),
            cache: Mutex::new(None),
        }
    }

    /// Append a component under attribute name `attr`.
    pub fn with_component(mut self, attr: impl Into<String>, component: Arc<dyn Component>) -> Self {
        self.components.push((attr.into(), component));
        self
    }

    /// Component registered under `attr`.
    pub fn component(&self, attr: &str) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|(name, _)| name == attr)
            .map(|(_, component)| component.as_ref())
    }

    /// Positioner registered under `attr`, if that component moves.
    pub fn positioner(&self, attr: &str) -> Option<&dyn Positioner> {
        self.component(attr).and_then(|c| c.as_positioner())
    }

    fn positioners(&self) -> impl Iterator<Item = (&str, &dyn Positioner, &dyn Component)> {
        self.components.iter().filter_map(|(attr, component)| {
            component
                .as_positioner()
                .map(|p| (attr.as_str(), p, component.as_ref()))
        })
    }

    /// Current position of every positioner, in declaration order.
    pub async fn positions(&self) -> AppResult<Vec<(String, f64)>> {
        let mut positions = Vec::new();
        for (attr, positioner, _) in self.positioners() {
            positions.push((attr.to_string(), positioner.position().await?));
        }
        Ok(positions)
    }

    /// Remember the current position of every positioner.
    ///
    /// Overwrites any earlier cache.
    pub async fn cache_position(&self) -> AppResult<()> {
        let positions = self.positions().await?;
        tracing::info!(bundle = %self.name, ?positions, "cached positions");
        *self.cache.lock() = Some(positions);
        Ok(())
    }

    /// The cached positions, if any.
    pub fn cached_positions(&self) -> Option<Vec<(String, f64)>> {
        self.cache.lock().clone()
    }

    /// True when `cache_position` has been called since the last resume.
    pub fn has_cached_position(&self) -> bool {
        self.cache.lock().is_some()
    }

    /// Move every cached axis back to its cached position.
    ///
    /// All moves are issued before any is waited on, then the call waits
    /// (without timeout) until every axis reports done. Fails with
    /// [`DeviceError::PositionNotCached`] when there is nothing cached.
    pub async fn resume_position(&self) -> AppResult<()> {
        let cached = self
            .cache
            .lock()
            .take()
            .ok_or_else(|| DeviceError::PositionNotCached(self.name.clone()))?;

        tracing::info!(bundle = %self.name, positions = ?cached, "resuming cached positions");
        let status = Status::all(
            cached
                .iter()
                .filter_map(|(attr, target)| self.positioner(attr).map(|p| p.move_to(*target))),
        );
        status.wait().await
    }

    /// Stop every positioner.
    pub async fn stop(&self) -> AppResult<()> {
        for (_, positioner, _) in self.positioners() {
            positioner.stop().await?;
        }
        Ok(())
    }

    /// Table of attribute name, PV and position for every positioner.
    pub async fn wh(&self) -> AppResult<PositionTable> {
        let mut rows = Vec::new();
        for (attr, positioner, component) in self.positioners() {
            rows.push(PositionRow {
                name: attr.to_string(),
                pv: component.address().to_string(),
                position: positioner.position().await?,
            });
        }
        Ok(PositionTable { rows })
    }
}

impl fmt::Debug for MotorBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorBundle")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field(
                "components",
                &self.components.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[async_trait]
impl Device for MotorBundle {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|(name, _)| name.as_str()).collect()
    }

    fn walk_signals(&self) -> Vec<SignalEntry<'_>> {
        self.components
            .iter()
            .flat_map(|(attr, component)| nest(attr, component.signals()))
            .collect()
    }
}

/// One row of a [`PositionTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub name: String,
    pub pv: String,
    pub position: f64,
}

/// "Where" summary of a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionTable {
    pub rows: Vec<PositionRow>,
}

impl fmt::Display for PositionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers = ["name", "PV", "position"];
        let cells: Vec<[String; 3]> = self
            .rows
            .iter()
            .map(|row| [row.name.clone(), row.pv.clone(), format!("{}", row.position)])
            .collect();

        let mut widths = headers.map(str::len);
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let rule = widths
            .iter()
            .map(|w| "=".repeat(*w))
            .collect::<Vec<_>>()
            .join(" ");

        writeln!(f, "{}", rule)?;
        write_row(f, headers, widths)?;
        writeln!(f, "{}", rule)?;
        for row in &cells {
            write_row(f, [row[0].as_str(), row[1].as_str(), row[2].as_str()], widths)?;
        }
        writeln!(f, "{}", rule)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, values: [&str; 3], widths: [usize; 3]) -> fmt::Result {
    let padded: Vec<String> = values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{:<width$}", value, width = width))
        .collect();
    writeln!(f, "{}", padded.join(" ").trim_end())
}
