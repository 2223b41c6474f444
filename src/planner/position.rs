//! Planner-side position tracking.
//!
//! The planner position is where the last queued block ends, not where the
//! machine is. Executed positions come from the [`Stepper`](super::Stepper).

use crate::motion::{Axis, NUM_AXES};

/// Target of the last queued move.
///
/// Integer steps are authoritative (head space, before motor coupling).
/// The float position keeps sub-step precision in machine units and the
/// Cartesian position is what `buffer_line` was last asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionTracker {
    steps: [i32; NUM_AXES],
    machine: [f32; NUM_AXES],
    cartesian: [f32; NUM_AXES],
}

impl PositionTracker {
    /// Tracker at the origin.
    pub const fn new() -> Self {
        Self {
            steps: [0; NUM_AXES],
            machine: [0.0; NUM_AXES],
            cartesian: [0.0; NUM_AXES],
        }
    }

    /// Position in steps.
    #[inline]
    pub fn steps(&self) -> &[i32; NUM_AXES] {
        &self.steps
    }

    /// Position in machine units.
    #[inline]
    pub fn machine(&self) -> &[f32; NUM_AXES] {
        &self.machine
    }

    /// Last Cartesian target.
    #[inline]
    pub fn cartesian(&self) -> &[f32; NUM_AXES] {
        &self.cartesian
    }

    /// Set both representations at once.
    pub fn set(&mut self, steps: [i32; NUM_AXES], machine: [f32; NUM_AXES]) {
        self.steps = steps;
        self.machine = machine;
    }

    /// Set one axis.
    pub fn set_axis(&mut self, axis: Axis, steps: i32, machine: f32) {
        self.steps[axis.index()] = steps;
        self.machine[axis.index()] = machine;
    }

    /// Record the Cartesian target.
    pub fn set_cartesian(&mut self, cartesian: [f32; NUM_AXES]) {
        self.cartesian = cartesian;
    }

    /// Set the Cartesian E coordinate only.
    pub fn set_cartesian_e(&mut self, e: f32) {
        self.cartesian[Axis::E.index()] = e;
    }

    /// Signed step deltas to `target`.
    pub fn deltas_to(&self, target: &[i32; NUM_AXES]) -> [i32; NUM_AXES] {
        let mut delta = [0; NUM_AXES];
        for (d, (t, p)) in delta.iter_mut().zip(target.iter().zip(&self.steps)) {
            *d = t.saturating_sub(*p);
        }
        delta
    }

    /// Halfway point to `target`, in steps and machine units.
    pub fn midpoint(
        &self,
        target: &[i32; NUM_AXES],
        target_machine: &[f32; NUM_AXES],
    ) -> ([i32; NUM_AXES], [f32; NUM_AXES]) {
        let mut steps = [0; NUM_AXES];
        let mut machine = [0.0; NUM_AXES];
        for i in 0..NUM_AXES {
            steps[i] = ((i64::from(self.steps[i]) + i64::from(target[i])) >> 1) as i32;
            machine[i] = (self.machine[i] + target_machine[i]) * 0.5;
        }
        (steps, machine)
    }
}
