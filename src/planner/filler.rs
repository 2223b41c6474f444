//! Block construction from a step-space target.

use libm::{ceilf, roundf, sqrtf};

use super::kinematics::Kinematics;
use super::stepper::Stepper;
use super::{Diagnostic, Planner};
use crate::config::{AxisConfig, ExtruderConfig};
use crate::motion::{
    max_allowable_speed_sqr, Axis, AxisBits, Block, BlockKind, JunctionInput, JunctionPolicy,
    Trapezoid, MINIMAL_STEP_RATE, NUM_AXES,
};

/// One move handed to the filler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct Segment {
    /// Target in head-space steps.
    pub target: [i32; NUM_AXES],
    /// Target in axis-space mm.
    pub target_machine: [f32; NUM_AXES],
    /// Requested feedrate in mm/s.
    pub feedrate: f32,
    /// Extruder index, already validated.
    pub extruder: u8,
    /// Known segment length, if any.
    pub millimeters: Option<f32>,
}

const E: usize = Axis::E.index();

impl<S: Stepper, K: Kinematics, const N: usize> Planner<'_, S, K, N> {
    /// Build the block for `segment` and advance the planner position.
    ///
    /// Returns `None` when no motor would take enough steps; the position is
    /// left where it was apart from a dropped extrusion.
    pub(super) fn fill_block(&mut self, segment: &Segment, split_move: bool) -> Option<Block> {
        let extruder = segment.extruder;
        let extruder_config = self.extruder_config(extruder);
        let e_constraints = self
            .constraints
            .extruder(extruder)
            .copied()
            .unwrap_or_default();

        let mut delta = self.position.deltas_to(&segment.target);
        if delta[E] != 0 {
            self.apply_extrusion_guards(segment, &mut delta);
        }

        let motor_delta = self.coupling.to_motors(&delta);
        let direction = AxisBits::negative(&motor_delta);
        let head_direction = AxisBits::negative(&delta);

        let esteps_float = delta[E] as f32 * e_constraints.e_factor;
        let esteps = (esteps_float.abs() + 0.5) as u32;

        let mut steps = [0u32; NUM_AXES];
        let mut motor_mm = [0.0f32; NUM_AXES];
        let mut head_mm_sqr = 0.0f32;
        for axis in Axis::LINEAR {
            let i = axis.index();
            steps[i] = motor_delta[i].unsigned_abs();
            motor_mm[i] = motor_delta[i] as f32 * self.constraints.mm_per_step[i];
            let head_mm = delta[i] as f32 * self.constraints.mm_per_step[i];
            head_mm_sqr += head_mm * head_mm;
        }
        steps[E] = esteps;
        motor_mm[E] = esteps_float * e_constraints.mm_per_step;

        let min_steps = self.config.motion.min_steps_per_segment;
        let millimeters = if steps[..E].iter().all(|s| *s < min_steps) {
            motor_mm[E].abs()
        } else {
            match segment.millimeters {
                Some(mm) if mm > 0.0 => mm,
                _ => sqrtf(head_mm_sqr),
            }
        };

        let step_event_count = steps.iter().copied().max().unwrap_or(0);
        if step_event_count < min_steps {
            return None;
        }

        self.enable_motors(&steps, extruder);

        let motion = self.config.motion;
        let feedrate = if esteps != 0 {
            segment.feedrate.max(motion.min_feedrate.value())
        } else {
            segment.feedrate.max(motion.min_travel_feedrate.value())
        };

        let inverse_millimeters = 1.0 / millimeters;
        let mut inverse_secs = feedrate * inverse_millimeters;

        let moves_queued = self.queue.nonbusy_moves_planned();
        let mut segment_time_us = roundf(1_000_000.0 / inverse_secs) as u32;
        let slowdown_range = 2..=(N / 2).saturating_sub(1);
        if slowdown_range.contains(&moves_queued) && segment_time_us < motion.min_segment_time_us {
            let stretched = segment_time_us
                + 2 * (motion.min_segment_time_us - segment_time_us) / moves_queued as u32;
            inverse_secs = 1_000_000.0 / stretched as f32;
            segment_time_us = stretched;
        }

        let mut nominal_speed_sqr = {
            let speed = millimeters * inverse_secs;
            speed * speed
        };
        let mut nominal_rate = ceilf(step_event_count as f32 * inverse_secs) as u32;

        let mut current_speed = [0.0f32; NUM_AXES];
        let mut speed_factor = 1.0f32;
        for axis in Axis::ALL {
            let i = axis.index();
            current_speed[i] = motor_mm[i] * inverse_secs;
            let speed = current_speed[i].abs();
            let max_speed = match axis {
                Axis::E => extruder_config.max_feedrate.value(),
                _ => self.config.axes.as_array()[i].max_feedrate.value(),
            };
            if speed > max_speed {
                speed_factor = speed_factor.min(max_speed / speed);
            }
        }
        if speed_factor < 1.0 {
            for speed in current_speed.iter_mut() {
                *speed *= speed_factor;
            }
            nominal_rate = (nominal_rate as f32 * speed_factor) as u32;
            nominal_speed_sqr *= speed_factor * speed_factor;
        }
        nominal_rate = nominal_rate.max(MINIMAL_STEP_RATE);

        let steps_per_mm = step_event_count as f32 * inverse_millimeters;
        let acceleration_steps_per_s2 = if steps[..E].iter().all(|s| *s == 0) {
            ceilf(extruder_config.retract_acceleration.value() * steps_per_mm) as u32
        } else {
            let base = if esteps != 0 {
                motion.acceleration.value()
            } else {
                motion.travel_acceleration.value()
            };
            let accel = ceilf(base * steps_per_mm) as u32;
            self.limit_acceleration(accel, &steps, step_event_count, extruder)
        };
        let acceleration = acceleration_steps_per_s2 as f32 / steps_per_mm;

        let max_acceleration = self.axis_limits(
            &extruder_config,
            |a| a.max_acceleration.value(),
            |e| e.max_acceleration.value(),
        );
        let max_jerk =
            self.axis_limits(&extruder_config, |a| a.max_jerk.value(), |e| e.max_jerk.value());
        let input = JunctionInput {
            delta_mm: motor_mm,
            inverse_millimeters,
            normalize: self.coupling.is_coupled() || esteps > 0,
            current_speed,
            millimeters,
            acceleration,
            nominal_speed_sqr,
            previous_nominal_speed_sqr: self.previous_nominal_speed_sqr,
            moves_queued: moves_queued != 0,
            max_acceleration,
            max_jerk,
            min_planner_speed: motion.min_planner_speed.value(),
        };
        let max_entry_speed_sqr = self
            .junction
            .max_entry_speed_sqr(&input)
            .min(nominal_speed_sqr);

        let min_speed_sqr = motion.min_planner_speed.squared();
        let v_allowable_sqr = max_allowable_speed_sqr(-acceleration, min_speed_sqr, millimeters);
        let entry_speed_sqr = if split_move {
            max_entry_speed_sqr.min(v_allowable_sqr)
        } else {
            min_speed_sqr.min(max_entry_speed_sqr)
        };

        self.previous_nominal_speed_sqr = nominal_speed_sqr;
        self.position.set(segment.target, segment.target_machine);

        Some(Block {
            kind: BlockKind::Motion,
            steps,
            step_event_count,
            direction,
            head_direction,
            extruder,
            millimeters,
            nominal_speed_sqr,
            entry_speed_sqr,
            max_entry_speed_sqr,
            nominal_length: nominal_speed_sqr <= v_allowable_sqr,
            acceleration,
            acceleration_steps_per_s2,
            nominal_rate,
            trapezoid: Trapezoid::default(),
            s_curve: None,
            segment_time_us,
        })
    }

    fn extruder_config(&self, extruder: u8) -> ExtruderConfig {
        self.config
            .extruder(extruder)
            .copied()
            .unwrap_or_default()
    }

    fn axis_limits(
        &self,
        extruder: &ExtruderConfig,
        axis: impl Fn(&AxisConfig) -> f32,
        e: impl Fn(&ExtruderConfig) -> f32,
    ) -> [f32; NUM_AXES] {
        let [x, y, z] = self.config.axes.as_array();
        [axis(x), axis(y), axis(z), e(extruder)]
    }

    /// Drop E from a move the extruder must not make.
    fn apply_extrusion_guards(&mut self, segment: &Segment, delta: &mut [i32; NUM_AXES]) {
        let extruder = segment.extruder;
        let guards = self.config.guards;
        let e_constraints = self
            .constraints
            .extruder(extruder)
            .copied()
            .unwrap_or_default();

        let tripped = if guards.prevent_cold_extrusion && self.stepper.is_cold(extruder) {
            Some(Diagnostic::ColdExtrusionPrevented { extruder })
        } else {
            guards.max_extrude_length.and_then(|max_length| {
                let esteps = delta[E] as f32 * e_constraints.e_factor;
                (esteps.abs() > e_constraints.steps_per_mm * max_length.value()).then(|| {
                    Diagnostic::LengthyExtrusionPrevented {
                        extruder,
                        length_mm: delta[E] as f32 * e_constraints.mm_per_step,
                    }
                })
            })
        };

        let Some(diagnostic) = tripped else {
            return;
        };
        match diagnostic {
            Diagnostic::ColdExtrusionPrevented { .. } => {
                warn!("cold extrusion prevented on E{}", extruder);
            }
            Diagnostic::LengthyExtrusionPrevented { length_mm, .. } => {
                warn!("lengthy extrusion prevented on E{}: {} mm", extruder, length_mm);
            }
        }
        self.position
            .set_axis(Axis::E, segment.target[E], segment.target_machine[E]);
        delta[E] = 0;
        self.record(diagnostic);
    }

    fn enable_motors(&mut self, steps: &[u32; NUM_AXES], extruder: u8) {
        let core = self.coupling.core_axes();
        for axis in Axis::LINEAR {
            let moving = match core {
                Some((a, b)) if axis == a || axis == b => {
                    steps[a.index()] != 0 || steps[b.index()] != 0
                }
                _ => steps[axis.index()] != 0,
            };
            if moving {
                self.stepper.enable_axis(axis);
            }
        }

        if steps[E] == 0 {
            return;
        }
        let count = self.config.extruder_count();
        if !self.config.queue.disable_inactive_extruders {
            for e in 0..count {
                self.stepper.enable_extruder(e);
            }
            return;
        }
        let hold = 2 * N as u32;
        for (e, last_move) in (0..count).zip(self.extruder_last_move.iter_mut()) {
            *last_move = last_move.saturating_sub(1);
            if e == extruder {
                *last_move = hold;
                self.stepper.enable_extruder(e);
            } else if *last_move == 0 {
                self.stepper.disable_extruder(e);
            }
        }
    }

    /// Clamp `accel` (steps/s²) so that no motor exceeds its own limit.
    fn limit_acceleration(
        &self,
        accel: u32,
        steps: &[u32; NUM_AXES],
        step_event_count: u32,
        extruder: u8,
    ) -> u32 {
        let mut accel = accel;
        if step_event_count <= self.constraints.cutoff_long {
            for axis in Axis::ALL {
                let axis_steps = steps[axis.index()];
                let max = self.constraints.axis_max_acceleration_steps(axis, extruder);
                if axis_steps != 0 && max < accel {
                    // cutoff_long keeps this product inside u32.
                    let comp = max * step_event_count;
                    if u64::from(accel) * u64::from(axis_steps) > u64::from(comp) {
                        accel = comp / axis_steps;
                    }
                }
            }
        } else {
            let sec = step_event_count as f32;
            for axis in Axis::ALL {
                let axis_steps = steps[axis.index()];
                let max = self.constraints.axis_max_acceleration_steps(axis, extruder);
                if axis_steps != 0 && max < accel {
                    let comp = max as f32 * sec;
                    if accel as f32 * axis_steps as f32 > comp {
                        accel = (comp / axis_steps as f32) as u32;
                    }
                }
            }
        }
        accel
    }
}
