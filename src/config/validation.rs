//! Configuration validation.

// Negated comparisons also reject NaN.
#![allow(clippy::neg_cmp_op_on_partial_ord)]

use crate::error::{ConfigError, Error, Result};
use crate::motion::Axis;

use super::axis::AxisConfig;
use super::PlannerConfig;

/// Validate a planner configuration.
///
/// Checks:
/// - Steps per mm, feedrates and accelerations are positive on every axis
/// - Jerk limits and junction deviation are not negative
/// - At least one extruder, each with flow in (0, 1000] percent
/// - Planner speed, segment and timer settings are usable
pub fn validate_config(config: &PlannerConfig) -> Result<()> {
    for (axis, cfg) in Axis::LINEAR.into_iter().zip(config.axes.as_array()) {
        validate_axis(axis, cfg)?;
    }

    if config.extruders.is_empty() {
        return Err(Error::Config(ConfigError::NoExtruders));
    }
    for e in config.extruders.iter() {
        let as_axis = AxisConfig {
            steps_per_mm: e.steps_per_mm,
            max_feedrate: e.max_feedrate,
            max_acceleration: e.max_acceleration,
            max_jerk: e.max_jerk,
        };
        validate_axis(Axis::E, &as_axis)?;

        if !(e.retract_acceleration.value() > 0.0) {
            return Err(Error::Config(ConfigError::InvalidAcceleration(
                e.retract_acceleration.value(),
            )));
        }
        if !(e.flow > 0.0 && e.flow <= 1000.0) {
            return Err(Error::Config(ConfigError::InvalidFlow(e.flow)));
        }
    }

    let motion = &config.motion;
    for accel in [motion.acceleration, motion.travel_acceleration] {
        if !(accel.value() > 0.0) {
            return Err(Error::Config(ConfigError::InvalidAcceleration(accel.value())));
        }
    }

    if !(motion.min_planner_speed.value() > 0.0) {
        return Err(Error::Config(ConfigError::InvalidMinPlannerSpeed(
            motion.min_planner_speed.value(),
        )));
    }

    if motion.min_steps_per_segment == 0 {
        return Err(Error::Config(ConfigError::InvalidMinStepsPerSegment(
            motion.min_steps_per_segment,
        )));
    }

    if motion.stepper_timer_rate_hz == 0 {
        return Err(Error::Config(ConfigError::InvalidTimerRate(
            motion.stepper_timer_rate_hz,
        )));
    }

    if !(motion.junction.deviation.value() >= 0.0) {
        return Err(Error::Config(ConfigError::InvalidJunctionDeviation(
            motion.junction.deviation.value(),
        )));
    }

    Ok(())
}

fn validate_axis(axis: Axis, config: &AxisConfig) -> Result<()> {
    if !(config.steps_per_mm > 0.0) {
        return Err(Error::Config(ConfigError::InvalidStepsPerMm {
            axis,
            value: config.steps_per_mm,
        }));
    }

    if !(config.max_feedrate.value() > 0.0) {
        return Err(Error::Config(ConfigError::InvalidMaxFeedrate {
            axis,
            value: config.max_feedrate.value(),
        }));
    }

    if !(config.max_acceleration.value() > 0.0) {
        return Err(Error::Config(ConfigError::InvalidMaxAcceleration {
            axis,
            value: config.max_acceleration.value(),
        }));
    }

    if !(config.max_jerk.value() >= 0.0) {
        return Err(Error::Config(ConfigError::InvalidJerk {
            axis,
            value: config.max_jerk.value(),
        }));
    }

    Ok(())
}
