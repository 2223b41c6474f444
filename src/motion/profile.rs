//! Trapezoid and S-curve profile calculation.
//!
//! Distances are in steps, rates in steps/s and accelerations in steps/s².
//! All relations come from `d = (v_end² - v_start²) / (2a)`.

use libm::{ceilf, floorf, sqrtf};
use serde::Deserialize;

use super::fastmath::integer_reciprocal;

/// Lowest step rate a block may start or end at, in steps/s.
///
/// Slower rates would overflow the step timer.
pub const MINIMAL_STEP_RATE: u32 = 120;

/// Velocity profile model used for every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileModel {
    /// Constant acceleration phases joined at corners.
    #[default]
    Trapezoid,
    /// Jerk-limited phases; stores time-domain parameters as well.
    SCurve,
}

/// Phase of a block at a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Accelerating from the entry rate toward cruise rate.
    Accelerating,
    /// Moving at constant cruise rate.
    Cruising,
    /// Decelerating toward the exit rate.
    Decelerating,
    /// Every step has been emitted.
    Complete,
}

/// Distance needed to go from `initial_rate` to `target_rate` at `accel`.
///
/// Negative `accel` gives the braking distance. Zero acceleration yields 0.
#[inline]
pub fn estimate_acceleration_distance(initial_rate: f32, target_rate: f32, accel: f32) -> f32 {
    if accel == 0.0 {
        return 0.0;
    }
    (target_rate * target_rate - initial_rate * initial_rate) / (accel * 2.0)
}

/// Point at which to stop accelerating and start braking so that a block of
/// `distance` steps starts at `initial_rate` and ends at `final_rate`.
///
/// Used when there is no room for a cruise phase.
#[inline]
pub fn intersection_distance(initial_rate: f32, final_rate: f32, accel: f32, distance: f32) -> f32 {
    if accel == 0.0 {
        return 0.0;
    }
    (accel * 2.0 * distance - initial_rate * initial_rate + final_rate * final_rate) / (accel * 4.0)
}

/// Rate reached after accelerating for `distance` from `initial_rate`.
#[inline]
pub fn final_speed(initial_rate: u32, accel: u32, distance: u32) -> u32 {
    let initial = initial_rate as f32;
    sqrtf(initial * initial + 2.0 * accel as f32 * distance as f32) as u32
}

/// Largest squared speed at the start of a segment of `distance` that still
/// reaches `target_velocity_sqr` at its end with `accel` (negative to brake).
#[inline]
pub fn max_allowable_speed_sqr(accel: f32, target_velocity_sqr: f32, distance: f32) -> f32 {
    target_velocity_sqr - 2.0 * accel * distance
}

/// Step boundaries and rates of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Trapezoid {
    /// Step index at which acceleration ends.
    pub accelerate_until: u32,
    /// Step index at which deceleration starts.
    pub decelerate_after: u32,
    /// Rate at the first step.
    pub initial_rate: u32,
    /// Peak rate (nominal rate when a cruise phase exists).
    pub cruise_rate: u32,
    /// Rate at the last step.
    pub final_rate: u32,
}

impl Trapezoid {
    /// Compute the profile of a block.
    ///
    /// `entry_factor` and `exit_factor` scale `nominal_rate` to the entry and
    /// exit rates. Both are floored at [`MINIMAL_STEP_RATE`].
    pub fn compute(
        step_event_count: u32,
        nominal_rate: u32,
        accel: u32,
        entry_factor: f32,
        exit_factor: f32,
    ) -> Self {
        let initial_rate = (ceilf(entry_factor * nominal_rate as f32) as u32).max(MINIMAL_STEP_RATE);
        let final_rate = (ceilf(exit_factor * nominal_rate as f32) as u32).max(MINIMAL_STEP_RATE);
        let accel_f = accel as f32;

        let mut accelerate_steps = ceilf(estimate_acceleration_distance(
            initial_rate as f32,
            nominal_rate as f32,
            accel_f,
        )) as u32;
        let decelerate_steps = floorf(estimate_acceleration_distance(
            nominal_rate as f32,
            final_rate as f32,
            -accel_f,
        )) as u32;

        let mut plateau_steps =
            i64::from(step_event_count) - i64::from(accelerate_steps) - i64::from(decelerate_steps);

        let cruise_rate = if plateau_steps < 0 {
            // No room to cruise: switch from accelerating to braking where
            // the two curves meet.
            let meet = ceilf(intersection_distance(
                initial_rate as f32,
                final_rate as f32,
                accel_f,
                step_event_count as f32,
            ));
            accelerate_steps = (meet.max(0.0) as u32).min(step_event_count);
            plateau_steps = 0;
            final_speed(initial_rate, accel, accelerate_steps)
        } else {
            nominal_rate
        };

        Self {
            accelerate_until: accelerate_steps,
            decelerate_after: accelerate_steps + plateau_steps as u32,
            initial_rate,
            cruise_rate,
            final_rate,
        }
    }

    /// Steps spent accelerating.
    #[inline]
    pub fn accel_steps(&self) -> u32 {
        self.accelerate_until
    }

    /// Steps spent at cruise rate.
    #[inline]
    pub fn cruise_steps(&self) -> u32 {
        self.decelerate_after - self.accelerate_until
    }
}

/// Time-domain parameters of an S-curve block, in stepper timer ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SCurveTiming {
    /// Duration of the acceleration phase.
    pub acceleration_time: u32,
    /// Duration of the deceleration phase.
    pub deceleration_time: u32,
    /// `2^24 / acceleration_time`.
    pub acceleration_time_inverse: u32,
    /// `2^24 / deceleration_time`.
    pub deceleration_time_inverse: u32,
}

impl SCurveTiming {
    /// Derive timing from a trapezoid and the block acceleration.
    pub fn from_trapezoid(trapezoid: &Trapezoid, accel: u32, timer_rate_hz: u32) -> Self {
        if accel == 0 {
            return Self::default();
        }
        let accel = accel as f32;
        let timer = timer_rate_hz as f32;
        let rise = trapezoid.cruise_rate.saturating_sub(trapezoid.initial_rate) as f32;
        let fall = trapezoid.cruise_rate.saturating_sub(trapezoid.final_rate) as f32;
        let acceleration_time = (rise / accel * timer) as u32;
        let deceleration_time = (fall / accel * timer) as u32;

        Self {
            acceleration_time,
            deceleration_time,
            acceleration_time_inverse: integer_reciprocal(acceleration_time),
            deceleration_time_inverse: integer_reciprocal(deceleration_time),
        }
    }
}
