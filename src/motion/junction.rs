//! Junction speed policies.
//!
//! A policy bounds the speed at the corner between the previous block and a
//! new one. Exactly one policy is active per planner; both keep whatever
//! history they need between calls.

use core::f32::consts::PI;

use libm::sqrtf;
use serde::Deserialize;

use super::axis::NUM_AXES;
use super::fastmath::{acos_approx, AcosMethod};

/// Colinear threshold: cosines above this are treated as a full reversal.
pub const JUNCTION_COS_LIMIT: f32 = 0.999_999;

/// Cosine below which a corner counts as sharper than 135°.
const OBTUSE_COS: f32 = -0.707_106_8;

/// Which junction policy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JunctionPolicyKind {
    /// Circular-arc deviation model.
    #[default]
    Deviation,
    /// Classic per-axis jerk.
    Jerk,
}

/// Everything a policy may look at for one junction.
#[derive(Debug, Clone, Copy)]
pub struct JunctionInput {
    /// Motor-space move in mm (E included).
    pub delta_mm: [f32; NUM_AXES],
    /// `1 / millimeters` of the new block.
    pub inverse_millimeters: f32,
    /// Normalize over all four components instead of scaling by
    /// `inverse_millimeters` (coupled machines and extruding moves).
    pub normalize: bool,
    /// Per-axis velocity of the new block in mm/s.
    pub current_speed: [f32; NUM_AXES],
    /// Block length in mm.
    pub millimeters: f32,
    /// Block acceleration in mm/s².
    pub acceleration: f32,
    /// Nominal speed squared of the new block.
    pub nominal_speed_sqr: f32,
    /// Nominal speed squared of the previous block (0 after a rest).
    pub previous_nominal_speed_sqr: f32,
    /// Whether any move is still queued ahead of this one.
    pub moves_queued: bool,
    /// Per-axis acceleration limits in mm/s², E for the active extruder.
    pub max_acceleration: [f32; NUM_AXES],
    /// Per-axis jerk limits in mm/s, E for the active extruder.
    pub max_jerk: [f32; NUM_AXES],
    /// Minimum planner speed in mm/s.
    pub min_planner_speed: f32,
}

impl JunctionInput {
    fn continues_motion(&self) -> bool {
        self.moves_queued && self.previous_nominal_speed_sqr.abs() > 1.0e-6
    }
}

/// Maximum junction speed computation.
pub trait JunctionPolicy {
    /// Maximum entry speed squared of the new block.
    ///
    /// Records the new block as the previous one for the next call.
    fn max_entry_speed_sqr(&mut self, input: &JunctionInput) -> f32;

    /// Forget the previous block, so the next one starts from rest.
    fn reset(&mut self);
}

/// Scale `vector` to unit length; zero vectors stay zero.
pub fn normalize_junction_vector(vector: &mut [f32; NUM_AXES]) {
    let magnitude_sqr: f32 = vector.iter().map(|v| v * v).sum();
    if magnitude_sqr > 0.0 {
        let inv = 1.0 / sqrtf(magnitude_sqr);
        for v in vector.iter_mut() {
            *v *= inv;
        }
    }
}

/// Largest value along `unit_vec` that keeps every axis below its limit.
pub fn limit_value_by_axis_maximum(
    max_value: f32,
    unit_vec: &[f32; NUM_AXES],
    axis_limits: &[f32; NUM_AXES],
) -> f32 {
    let mut limit = max_value;
    for (u, max) in unit_vec.iter().zip(axis_limits) {
        if *u != 0.0 {
            limit = limit.min((max / u).abs());
        }
    }
    limit
}

/// Junction deviation policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionDeviation {
    deviation_mm: f32,
    acos: AcosMethod,
    previous_unit_vec: [f32; NUM_AXES],
}

impl JunctionDeviation {
    /// Create with a deviation tolerance in mm.
    pub const fn new(deviation_mm: f32, acos: AcosMethod) -> Self {
        Self {
            deviation_mm,
            acos,
            previous_unit_vec: [0.0; NUM_AXES],
        }
    }

    /// Configured tolerance.
    pub fn deviation_mm(&self) -> f32 {
        self.deviation_mm
    }

    fn corner_speed_sqr(&self, input: &JunctionInput, unit_vec: &[f32; NUM_AXES]) -> f32 {
        let prev = &self.previous_unit_vec;
        let mut cos_theta: f32 = -(0..NUM_AXES).map(|i| prev[i] * unit_vec[i]).sum::<f32>();

        if cos_theta > JUNCTION_COS_LIMIT {
            return input.min_planner_speed * input.min_planner_speed;
        }
        cos_theta = cos_theta.max(-JUNCTION_COS_LIMIT);

        let mut junction_vec = [0.0; NUM_AXES];
        for i in 0..NUM_AXES {
            junction_vec[i] = unit_vec[i] - prev[i];
        }
        normalize_junction_vector(&mut junction_vec);

        let junction_acceleration =
            limit_value_by_axis_maximum(input.acceleration, &junction_vec, &input.max_acceleration);
        let sin_theta_d2 = sqrtf(0.5 * (1.0 - cos_theta));
        let mut vmax_sqr =
            self.deviation_mm * junction_acceleration * sin_theta_d2 / (1.0 - sin_theta_d2);

        // Short segments around a sharp corner approximate an arc instead:
        // turning by `turning` over the segment length gives v² = L·a / turning.
        if input.millimeters < 1.0 && cos_theta < OBTUSE_COS {
            let turning = PI - acos_approx(self.acos, cos_theta);
            if turning > 0.0 {
                vmax_sqr = vmax_sqr.min(input.millimeters * junction_acceleration / turning);
            }
        }
        vmax_sqr
    }
}

impl JunctionPolicy for JunctionDeviation {
    fn max_entry_speed_sqr(&mut self, input: &JunctionInput) -> f32 {
        let mut unit_vec = input.delta_mm;
        if input.normalize {
            normalize_junction_vector(&mut unit_vec);
        } else {
            for v in unit_vec.iter_mut() {
                *v *= input.inverse_millimeters;
            }
        }

        let vmax_sqr = if input.continues_motion() {
            self.corner_speed_sqr(input, &unit_vec)
                .min(input.nominal_speed_sqr)
                .min(input.previous_nominal_speed_sqr)
        } else {
            0.0
        };

        self.previous_unit_vec = unit_vec;
        vmax_sqr
    }

    fn reset(&mut self) {
        self.previous_unit_vec = [0.0; NUM_AXES];
    }
}

/// Classic per-axis jerk policy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassicJerk {
    previous_speed: [f32; NUM_AXES],
    previous_safe_speed: f32,
}

impl ClassicJerk {
    /// Create with no history.
    pub const fn new() -> Self {
        Self {
            previous_speed: [0.0; NUM_AXES],
            previous_safe_speed: 0.0,
        }
    }

    /// Speed from which the block could stop within the jerk limits.
    fn safe_speed(input: &JunctionInput, nominal_speed: f32) -> f32 {
        let mut safe_speed = nominal_speed;
        let mut limited = false;
        for i in 0..NUM_AXES {
            let jerk = input.current_speed[i].abs();
            let max_jerk = input.max_jerk[i];
            if jerk > max_jerk {
                if limited {
                    let mjerk = max_jerk * nominal_speed;
                    if jerk * safe_speed > mjerk {
                        safe_speed = mjerk / jerk;
                    }
                } else {
                    safe_speed *= max_jerk / jerk;
                    limited = true;
                }
            }
        }
        safe_speed
    }
}

impl JunctionPolicy for ClassicJerk {
    fn max_entry_speed_sqr(&mut self, input: &JunctionInput) -> f32 {
        let nominal_speed = sqrtf(input.nominal_speed_sqr);
        let safe_speed = Self::safe_speed(input, nominal_speed);

        let vmax_junction = if input.continues_motion() {
            let previous_nominal_speed = sqrtf(input.previous_nominal_speed_sqr);
            let mut vmax = nominal_speed.min(previous_nominal_speed);
            let smaller_speed_factor = vmax / previous_nominal_speed;

            let mut v_factor = 1.0f32;
            let mut limited = false;
            for i in 0..NUM_AXES {
                let mut v_exit = self.previous_speed[i] * smaller_speed_factor;
                let mut v_entry = input.current_speed[i];
                if limited {
                    v_exit *= v_factor;
                    v_entry *= v_factor;
                }

                // Coasting keeps the sign, a reversal adds both magnitudes.
                let jerk = if v_exit > v_entry {
                    if v_entry > 0.0 || v_exit < 0.0 {
                        v_exit - v_entry
                    } else {
                        v_exit.max(-v_entry)
                    }
                } else if v_entry < 0.0 || v_exit > 0.0 {
                    v_entry - v_exit
                } else {
                    (-v_exit).max(v_entry)
                };

                if jerk > input.max_jerk[i] {
                    v_factor *= input.max_jerk[i] / jerk;
                    limited = true;
                }
            }
            if limited {
                vmax *= v_factor;
            }

            // Separate safe exit and entry speeds may beat the shared one.
            let threshold = vmax * 0.99;
            if self.previous_safe_speed > threshold && safe_speed > threshold {
                vmax = safe_speed;
            }
            vmax
        } else {
            safe_speed
        };

        self.previous_safe_speed = safe_speed;
        self.previous_speed = input.current_speed;
        vmax_junction * vmax_junction
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// The policy selected at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Junction {
    /// Junction deviation.
    Deviation(JunctionDeviation),
    /// Classic jerk.
    Jerk(ClassicJerk),
}

impl Junction {
    /// Build the policy named by `kind`.
    pub const fn new(kind: JunctionPolicyKind, deviation_mm: f32, acos: AcosMethod) -> Self {
        match kind {
            JunctionPolicyKind::Deviation => Junction::Deviation(JunctionDeviation::new(deviation_mm, acos)),
            JunctionPolicyKind::Jerk => Junction::Jerk(ClassicJerk::new()),
        }
    }

    /// Which policy this is.
    pub const fn kind(&self) -> JunctionPolicyKind {
        match self {
            Junction::Deviation(_) => JunctionPolicyKind::Deviation,
            Junction::Jerk(_) => JunctionPolicyKind::Jerk,
        }
    }
}

impl JunctionPolicy for Junction {
    fn max_entry_speed_sqr(&mut self, input: &JunctionInput) -> f32 {
        match self {
            Junction::Deviation(p) => p.max_entry_speed_sqr(input),
            Junction::Jerk(p) => p.max_entry_speed_sqr(input),
        }
    }

    fn reset(&mut self) {
        match self {
            Junction::Deviation(p) => p.reset(),
            Junction::Jerk(p) => p.reset(),
        }
    }
}
