//! Per-axis and per-extruder configuration from TOML.

use serde::Deserialize;

use super::units::{MillimetersPerSec, MillimetersPerSecSquared};

/// Limits of one linear axis (or motor on coupled machines).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AxisConfig {
    /// Steps per millimeter.
    pub steps_per_mm: f32,

    /// Maximum feedrate in mm/s.
    #[serde(rename = "max_feedrate_mm_s")]
    pub max_feedrate: MillimetersPerSec,

    /// Maximum acceleration in mm/s².
    #[serde(rename = "max_acceleration_mm_s2")]
    pub max_acceleration: MillimetersPerSecSquared,

    /// Maximum instantaneous speed change in mm/s (classic jerk only).
    #[serde(default = "default_axis_jerk", rename = "max_jerk_mm_s")]
    pub max_jerk: MillimetersPerSec,
}

fn default_axis_jerk() -> MillimetersPerSec {
    MillimetersPerSec(10.0)
}

impl AxisConfig {
    /// Create an axis with the default jerk.
    pub const fn new(steps_per_mm: f32, max_feedrate: f32, max_acceleration: f32) -> Self {
        Self {
            steps_per_mm,
            max_feedrate: MillimetersPerSec(max_feedrate),
            max_acceleration: MillimetersPerSecSquared(max_acceleration),
            max_jerk: MillimetersPerSec(10.0),
        }
    }
}

/// The three linear axes.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AxesConfig {
    /// X axis (motor A).
    pub x: AxisConfig,
    /// Y axis (motor B).
    pub y: AxisConfig,
    /// Z axis (motor C).
    pub z: AxisConfig,
}

impl AxesConfig {
    /// Axes in X, Y, Z order.
    pub fn as_array(&self) -> [&AxisConfig; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// Mutable axes in X, Y, Z order.
    pub fn as_array_mut(&mut self) -> [&mut AxisConfig; 3] {
        [&mut self.x, &mut self.y, &mut self.z]
    }
}

impl Default for AxesConfig {
    fn default() -> Self {
        Self {
            x: AxisConfig::new(80.0, 300.0, 3000.0),
            y: AxisConfig::new(80.0, 300.0, 3000.0),
            z: AxisConfig::new(400.0, 5.0, 100.0),
        }
    }
}

/// One extruder.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ExtruderConfig {
    /// Steps per millimeter of filament.
    pub steps_per_mm: f32,

    /// Maximum feedrate in mm/s.
    #[serde(rename = "max_feedrate_mm_s")]
    pub max_feedrate: MillimetersPerSec,

    /// Maximum acceleration in mm/s².
    #[serde(rename = "max_acceleration_mm_s2")]
    pub max_acceleration: MillimetersPerSecSquared,

    /// Acceleration for extrusion-only moves in mm/s².
    #[serde(default = "default_retract_acceleration", rename = "retract_acceleration_mm_s2")]
    pub retract_acceleration: MillimetersPerSecSquared,

    /// Maximum instantaneous speed change in mm/s (classic jerk only).
    #[serde(default = "default_extruder_jerk", rename = "max_jerk_mm_s")]
    pub max_jerk: MillimetersPerSec,

    /// Extrusion multiplier in percent.
    #[serde(default = "default_flow", rename = "flow_percent")]
    pub flow: f32,
}

fn default_retract_acceleration() -> MillimetersPerSecSquared {
    MillimetersPerSecSquared(3000.0)
}

fn default_extruder_jerk() -> MillimetersPerSec {
    MillimetersPerSec(5.0)
}

fn default_flow() -> f32 {
    100.0
}

impl ExtruderConfig {
    /// Multiplier applied to extruder steps.
    #[inline]
    pub fn e_factor(&self) -> f32 {
        self.flow * 0.01
    }
}

impl Default for ExtruderConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: 93.0,
            max_feedrate: MillimetersPerSec(100.0),
            max_acceleration: MillimetersPerSecSquared(10_000.0),
            retract_acceleration: default_retract_acceleration(),
            max_jerk: default_extruder_jerk(),
            flow: default_flow(),
        }
    }
}
