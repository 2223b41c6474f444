//! Configuration module for stepper-planner.
//!
//! Provides types for loading and validating axis, extruder and planner
//! settings from TOML files (with `std` feature) or pre-parsed data, and the
//! step-space constraints derived from them.

mod axis;
#[cfg(feature = "std")]
mod loader;
mod mechanical;
mod system;
pub mod units;
mod validation;

pub use axis::{AxesConfig, AxisConfig, ExtruderConfig};
pub use mechanical::{ExtruderConstraints, MechanicalConstraints};
pub use system::{
    GuardConfig, IdleAxes, JunctionConfig, MotionConfig, PlannerConfig, QueueConfig,
    MAX_EXTRUDERS,
};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Millimeters, MillimetersPerSec, MillimetersPerSecSquared, UnitExt};
