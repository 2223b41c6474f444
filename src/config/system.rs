//! Planner configuration - root configuration structure.

use heapless::Vec;
use serde::Deserialize;

use super::axis::{AxesConfig, ExtruderConfig};
use super::units::{Millimeters, MillimetersPerSec, MillimetersPerSecSquared};
use crate::motion::fastmath::AcosMethod;
use crate::motion::{Coupling, JunctionPolicyKind, ProfileModel};

/// Maximum number of extruders.
pub const MAX_EXTRUDERS: usize = 6;

/// Root configuration structure from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerConfig {
    /// Linear axis limits.
    pub axes: AxesConfig,

    /// Extruders, in tool order.
    pub extruders: Vec<ExtruderConfig, MAX_EXTRUDERS>,

    /// Planner tuning.
    #[serde(default)]
    pub motion: MotionConfig,

    /// Extrusion guards.
    #[serde(default)]
    pub guards: GuardConfig,

    /// Queue behavior.
    #[serde(default)]
    pub queue: QueueConfig,
}

impl PlannerConfig {
    /// Get an extruder configuration by index.
    pub fn extruder(&self, index: u8) -> Option<&ExtruderConfig> {
        self.extruders.get(index as usize)
    }

    /// Number of configured extruders.
    pub fn extruder_count(&self) -> u8 {
        self.extruders.len() as u8
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        let mut extruders = Vec::new();
        let _ = extruders.push(ExtruderConfig::default());
        Self {
            axes: AxesConfig::default(),
            extruders,
            motion: MotionConfig::default(),
            guards: GuardConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Planner tuning from the `[motion]` table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MotionConfig {
    /// Acceleration for printing moves.
    #[serde(default = "default_acceleration", rename = "acceleration_mm_s2")]
    pub acceleration: MillimetersPerSecSquared,

    /// Acceleration for travel moves.
    #[serde(default = "default_travel_acceleration", rename = "travel_acceleration_mm_s2")]
    pub travel_acceleration: MillimetersPerSecSquared,

    /// Feedrate floor for printing moves.
    #[serde(default, rename = "min_feedrate_mm_s")]
    pub min_feedrate: MillimetersPerSec,

    /// Feedrate floor for travel moves.
    #[serde(default, rename = "min_travel_feedrate_mm_s")]
    pub min_travel_feedrate: MillimetersPerSec,

    /// Speed assumed at the end of the queue.
    #[serde(default = "default_min_planner_speed", rename = "min_planner_speed_mm_s")]
    pub min_planner_speed: MillimetersPerSec,

    /// Moves with fewer steps on every axis are folded into the position.
    #[serde(default = "default_min_steps_per_segment")]
    pub min_steps_per_segment: u32,

    /// Segments shorter than this are stretched while the queue drains.
    #[serde(default = "default_min_segment_time_us")]
    pub min_segment_time_us: u32,

    /// Queue the first move after a rest as two halves.
    #[serde(default)]
    pub split_first_move: bool,

    /// Belt arrangement.
    #[serde(default)]
    pub coupling: Coupling,

    /// Mirrored core belt routing.
    #[serde(default)]
    pub coupling_reversed: bool,

    /// Velocity profile model.
    #[serde(default)]
    pub profile: ProfileModel,

    /// Stepper timer frequency, used for S-curve timing.
    #[serde(default = "default_timer_rate")]
    pub stepper_timer_rate_hz: u32,

    /// Junction speed policy.
    #[serde(default)]
    pub junction: JunctionConfig,
}

fn default_acceleration() -> MillimetersPerSecSquared {
    MillimetersPerSecSquared(1500.0)
}

fn default_travel_acceleration() -> MillimetersPerSecSquared {
    MillimetersPerSecSquared(3000.0)
}

fn default_min_planner_speed() -> MillimetersPerSec {
    MillimetersPerSec(0.05)
}

fn default_min_steps_per_segment() -> u32 {
    6
}

fn default_min_segment_time_us() -> u32 {
    20_000
}

fn default_timer_rate() -> u32 {
    2_000_000
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            acceleration: default_acceleration(),
            travel_acceleration: default_travel_acceleration(),
            min_feedrate: MillimetersPerSec(0.0),
            min_travel_feedrate: MillimetersPerSec(0.0),
            min_planner_speed: default_min_planner_speed(),
            min_steps_per_segment: default_min_steps_per_segment(),
            min_segment_time_us: default_min_segment_time_us(),
            split_first_move: false,
            coupling: Coupling::default(),
            coupling_reversed: false,
            profile: ProfileModel::default(),
            stepper_timer_rate_hz: default_timer_rate(),
            junction: JunctionConfig::default(),
        }
    }
}

/// Junction policy from `[motion.junction]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct JunctionConfig {
    /// Which policy to run.
    #[serde(default)]
    pub policy: JunctionPolicyKind,

    /// Corner deviation tolerance.
    #[serde(default = "default_deviation", rename = "deviation_mm")]
    pub deviation: Millimeters,

    /// Arc-cosine used by the short-segment correction.
    #[serde(default)]
    pub acos: AcosMethod,
}

fn default_deviation() -> Millimeters {
    Millimeters(0.05)
}

impl Default for JunctionConfig {
    fn default() -> Self {
        Self {
            policy: JunctionPolicyKind::default(),
            deviation: default_deviation(),
            acos: AcosMethod::default(),
        }
    }
}

/// Extrusion guards from `[guards]`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GuardConfig {
    /// Drop E from moves while the extruder is cold.
    #[serde(default = "default_true")]
    pub prevent_cold_extrusion: bool,

    /// Drop E from moves extruding more than this; `None` disables the check.
    #[serde(default, rename = "max_extrude_length_mm")]
    pub max_extrude_length: Option<Millimeters>,
}

fn default_true() -> bool {
    true
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            prevent_cold_extrusion: true,
            max_extrude_length: None,
        }
    }
}

/// Axes that may be disabled when idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IdleAxes {
    /// X (motor A).
    #[serde(default)]
    pub x: bool,
    /// Y (motor B).
    #[serde(default)]
    pub y: bool,
    /// Z (motor C).
    #[serde(default)]
    pub z: bool,
    /// Extruders.
    #[serde(default = "default_true")]
    pub e: bool,
}

impl IdleAxes {
    /// Flags in X, Y, Z, E order.
    pub const fn as_array(&self) -> [bool; 4] {
        [self.x, self.y, self.z, self.e]
    }
}

impl Default for IdleAxes {
    fn default() -> Self {
        Self {
            x: false,
            y: false,
            z: false,
            e: true,
        }
    }
}

/// Queue behavior from `[queue]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    /// Consumer polls to wait before taking the first block of a burst.
    #[serde(default = "default_first_move_delay")]
    pub first_move_delay_polls: u16,

    /// Consumer polls during which moves are refused after a quick stop.
    #[serde(default = "default_cooldown")]
    pub quick_stop_cooldown_polls: u32,

    /// Disable extruders that have not moved for a while.
    #[serde(default = "default_true")]
    pub disable_inactive_extruders: bool,

    /// Axes `check_axes_activity` may disable.
    #[serde(default)]
    pub disable_idle_axes: IdleAxes,
}

fn default_first_move_delay() -> u16 {
    100
}

fn default_cooldown() -> u32 {
    1000
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            first_move_delay_polls: default_first_move_delay(),
            quick_stop_cooldown_polls: default_cooldown(),
            disable_inactive_extruders: true,
            disable_idle_axes: IdleAxes::default(),
        }
    }
}
