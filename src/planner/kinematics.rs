//! Cartesian to axis-space transforms.

use libm::sqrtf;

use crate::error::{Error, KinematicsError, Result};
use crate::motion::Axis;

/// Kinematics handler consumed by [`Planner::buffer_line`](super::Planner::buffer_line).
pub trait Kinematics {
    /// Convert a Cartesian target to axis space.
    ///
    /// # Errors
    ///
    /// Returns [`KinematicsError::Unreachable`] for targets the machine
    /// cannot reach. Nothing is queued in that case.
    fn transform(&self, cartesian: &[f32; 3]) -> Result<[f32; 3]>;

    /// Whether axis space differs from Cartesian space, so segment lengths
    /// must be measured on the Cartesian target.
    fn is_kinematic(&self) -> bool {
        false
    }
}

/// Identity kinematics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cartesian;

impl Kinematics for Cartesian {
    fn transform(&self, cartesian: &[f32; 3]) -> Result<[f32; 3]> {
        Ok(*cartesian)
    }
}

/// Cylindrical build volume, as on delta machines.
///
/// Targets pass through unchanged once they are inside `radius` around the
/// Z axis and within `0..=height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderEnvelope {
    radius: f32,
    height: f32,
}

impl CylinderEnvelope {
    /// Create an envelope.
    pub const fn new(radius: f32, height: f32) -> Self {
        Self { radius, height }
    }

    /// Reachable radius.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Reachable height.
    pub fn height(&self) -> f32 {
        self.height
    }
}

impl Kinematics for CylinderEnvelope {
    fn transform(&self, cartesian: &[f32; 3]) -> Result<[f32; 3]> {
        let [x, y, z] = *cartesian;

        let r = sqrtf(x * x + y * y);
        if r > self.radius {
            let axis = if x.abs() >= y.abs() { Axis::X } else { Axis::Y };
            return Err(Error::Kinematics(KinematicsError::Unreachable {
                axis,
                value: r,
                limit: self.radius,
            }));
        }

        if z < 0.0 || z > self.height {
            let limit = if z < 0.0 { 0.0 } else { self.height };
            return Err(Error::Kinematics(KinematicsError::Unreachable {
                axis: Axis::Z,
                value: z,
                limit,
            }));
        }

        Ok(*cartesian)
    }

    fn is_kinematic(&self) -> bool {
        true
    }
}
