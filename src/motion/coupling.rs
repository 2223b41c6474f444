//! Motor coupling between logical head axes and physical motors.
//!
//! Core machines drive two logical axes with a pair of belts:
//! `m1 = p + f·q` and `m2 = f·(p − f·q)`, where `f` is `-1` for mirrored
//! belt routing. The transform is linear, so it applies to deltas and to
//! absolute positions alike.

use serde::Deserialize;

use super::axis::{Axis, NUM_AXES};

/// Belt arrangement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Coupling {
    /// One motor per axis.
    #[default]
    Cartesian,
    /// X and Y share motors A and B.
    CoreXy,
    /// X and Z share motors A and C.
    CoreXz,
    /// Y and Z share motors B and C.
    CoreYz,
}

impl Coupling {
    /// The coupled axis pair, if any.
    pub const fn core_axes(self) -> Option<(Axis, Axis)> {
        match self {
            Coupling::Cartesian => None,
            Coupling::CoreXy => Some((Axis::X, Axis::Y)),
            Coupling::CoreXz => Some((Axis::X, Axis::Z)),
            Coupling::CoreYz => Some((Axis::Y, Axis::Z)),
        }
    }
}

/// Coupling strategy with its belt orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorCoupling {
    kind: Coupling,
    reversed: bool,
}

impl MotorCoupling {
    /// Create a coupling.
    pub const fn new(kind: Coupling, reversed: bool) -> Self {
        Self { kind, reversed }
    }

    /// Belt arrangement.
    pub const fn kind(&self) -> Coupling {
        self.kind
    }

    /// Whether any two axes share motors.
    pub const fn is_coupled(&self) -> bool {
        !matches!(self.kind, Coupling::Cartesian)
    }

    /// The coupled axis pair, if any.
    pub const fn core_axes(&self) -> Option<(Axis, Axis)> {
        self.kind.core_axes()
    }

    const fn factor(&self) -> i32 {
        if self.reversed {
            -1
        } else {
            1
        }
    }

    /// Map head-space steps to motor steps.
    pub fn to_motors(&self, head: &[i32; NUM_AXES]) -> [i32; NUM_AXES] {
        let mut motors = *head;
        if let Some((a, b)) = self.core_axes() {
            let f = self.factor();
            let p = head[a.index()];
            let q = head[b.index()];
            motors[a.index()] = p + f * q;
            motors[b.index()] = f * (p - f * q);
        }
        motors
    }

    /// Logical position of `axis` in steps, reconstructed from motor counts.
    ///
    /// Coupled axes may land on half steps.
    pub fn axis_steps(&self, axis: Axis, motors: &[i32; NUM_AXES]) -> f32 {
        match self.core_axes() {
            Some((a, b)) if axis == a || axis == b => {
                let f = self.factor() as f32;
                let m1 = motors[a.index()] as f32;
                let m2 = motors[b.index()] as f32;
                if axis == a {
                    (m1 + f * m2) * 0.5
                } else {
                    (f * m1 - m2) * 0.5
                }
            }
            _ => motors[axis.index()] as f32,
        }
    }
}
