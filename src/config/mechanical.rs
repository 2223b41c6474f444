//! Step-space constraints derived from the planner configuration.

use heapless::Vec;

use super::system::{PlannerConfig, MAX_EXTRUDERS};
use crate::motion::Axis;

/// Derived per-extruder parameters.
///
/// The default has no steps, so E never moves without an extruder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExtruderConstraints {
    /// Steps per millimeter.
    pub steps_per_mm: f32,
    /// Millimeters per step.
    pub mm_per_step: f32,
    /// Maximum acceleration in steps/s².
    pub max_acceleration_steps_per_s2: u32,
    /// Flow multiplier.
    pub e_factor: f32,
}

/// Derived mechanical parameters computed from the configuration.
///
/// Computed at initialization and again whenever steps-per-mm or
/// acceleration limits change at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanicalConstraints {
    /// Steps per millimeter for X/Y/Z.
    pub steps_per_mm: [f32; 3],

    /// Millimeters per step for X/Y/Z.
    pub mm_per_step: [f32; 3],

    /// Maximum acceleration in steps/s² for X/Y/Z.
    pub max_acceleration_steps_per_s2: [u32; 3],

    /// Per-extruder values, in tool order.
    pub extruders: Vec<ExtruderConstraints, MAX_EXTRUDERS>,

    /// Step counts above this switch the per-axis acceleration limit to
    /// floating point to avoid `u32` overflow.
    pub cutoff_long: u32,

    active_extruder: u8,
}

impl MechanicalConstraints {
    /// Compute constraints from the planner configuration.
    pub fn from_config(config: &PlannerConfig) -> Self {
        let mut steps_per_mm = [0.0; 3];
        let mut mm_per_step = [0.0; 3];
        let mut max_acceleration_steps_per_s2 = [0; 3];
        for (i, axis) in config.axes.as_array().into_iter().enumerate() {
            steps_per_mm[i] = axis.steps_per_mm;
            mm_per_step[i] = 1.0 / axis.steps_per_mm;
            max_acceleration_steps_per_s2[i] =
                (axis.max_acceleration.value() * axis.steps_per_mm) as u32;
        }

        let mut extruders = Vec::new();
        for e in config.extruders.iter() {
            let _ = extruders.push(ExtruderConstraints {
                steps_per_mm: e.steps_per_mm,
                mm_per_step: 1.0 / e.steps_per_mm,
                max_acceleration_steps_per_s2: (e.max_acceleration.value() * e.steps_per_mm) as u32,
                e_factor: e.e_factor(),
            });
        }

        let mut constraints = Self {
            steps_per_mm,
            mm_per_step,
            max_acceleration_steps_per_s2,
            extruders,
            cutoff_long: 0,
            active_extruder: 0,
        };
        constraints.update_cutoff();
        constraints
    }

    /// Extruder whose acceleration takes part in `cutoff_long`.
    pub fn active_extruder(&self) -> u8 {
        self.active_extruder
    }

    /// Switch the active extruder, recomputing `cutoff_long`.
    pub fn set_active_extruder(&mut self, extruder: u8) {
        if extruder != self.active_extruder && (extruder as usize) < self.extruders.len() {
            self.active_extruder = extruder;
            self.update_cutoff();
        }
    }

    fn update_cutoff(&mut self) {
        let mut highest_rate = 1u32;
        for rate in self.max_acceleration_steps_per_s2 {
            highest_rate = highest_rate.max(rate);
        }
        if let Some(e) = self.extruders.get(self.active_extruder as usize) {
            highest_rate = highest_rate.max(e.max_acceleration_steps_per_s2);
        }
        self.cutoff_long = u32::MAX / highest_rate;
    }

    /// Parameters of one extruder, falling back to the first.
    ///
    /// `None` only when no extruder is configured.
    #[inline]
    pub fn extruder(&self, extruder: u8) -> Option<&ExtruderConstraints> {
        self.extruders
            .get(extruder as usize)
            .or_else(|| self.extruders.first())
    }

    /// Steps per millimeter on any axis, E for the given extruder.
    #[inline]
    pub fn axis_steps_per_mm(&self, axis: Axis, extruder: u8) -> f32 {
        match axis {
            Axis::E => self.extruder(extruder).map_or(0.0, |e| e.steps_per_mm),
            _ => self.steps_per_mm[axis.index()],
        }
    }

    /// Millimeters per step on any axis, E for the given extruder.
    #[inline]
    pub fn axis_mm_per_step(&self, axis: Axis, extruder: u8) -> f32 {
        match axis {
            Axis::E => self.extruder(extruder).map_or(0.0, |e| e.mm_per_step),
            _ => self.mm_per_step[axis.index()],
        }
    }

    /// Maximum acceleration in steps/s², E for the given extruder.
    #[inline]
    pub fn axis_max_acceleration_steps(&self, axis: Axis, extruder: u8) -> u32 {
        match axis {
            Axis::E => self
                .extruder(extruder)
                .map_or(0, |e| e.max_acceleration_steps_per_s2),
            _ => self.max_acceleration_steps_per_s2[axis.index()],
        }
    }

    /// Convert millimeters to steps, rounding to nearest.
    #[inline]
    pub fn mm_to_steps(&self, axis: Axis, mm: f32, extruder: u8) -> i32 {
        libm::floorf(mm * self.axis_steps_per_mm(axis, extruder) + 0.5) as i32
    }

    /// Convert steps to millimeters.
    #[inline]
    pub fn steps_to_mm(&self, axis: Axis, steps: f32, extruder: u8) -> f32 {
        steps * self.axis_mm_per_step(axis, extruder)
    }
}
