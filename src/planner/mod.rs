//! Planner module for stepper-planner.
//!
//! Turns target positions into planned blocks, queues them for the step
//! generator and keeps the look-ahead plan consistent as blocks arrive.

mod buffer;
mod builder;
mod filler;
mod kinematics;
mod position;
mod recalc;
mod stepper;

pub use buffer::{BlockQueue, ClaimedBlock, Consumer, Producer};
pub use builder::PlannerBuilder;
pub use kinematics::{Cartesian, CylinderEnvelope, Kinematics};
pub use position::PositionTracker;
pub use recalc::RecalcSettings;
pub use stepper::{masked, ConsumerMask, Stepper};

use heapless::Deque;
use libm::sqrtf;

use crate::config::{validate_config, MechanicalConstraints, PlannerConfig, MAX_EXTRUDERS};
use crate::error::{PlannerError, Result};
use crate::motion::{Axis, Block, Junction, MotorCoupling, NUM_AXES};

use filler::Segment;

/// Largest step position a target may convert to. Deltas between two such
/// positions, and their coupled motor sums, stay inside `i32`.
const MAX_TARGET_STEPS: f32 = (1u32 << 29) as f32;

/// Diagnostics kept until the command layer drains them.
pub const DIAGNOSTIC_CAPACITY: usize = 8;

/// Outcome of a move request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Queued {
    /// At least one block was queued.
    Block,
    /// The move was folded into the position without queuing anything.
    Absorbed,
}

/// Recoverable events reported alongside a successful move.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
    /// E was dropped because the extruder is cold.
    ColdExtrusionPrevented {
        /// Extruder index.
        extruder: u8,
    },
    /// E was dropped because the move extrudes too much at once.
    LengthyExtrusionPrevented {
        /// Extruder index.
        extruder: u8,
        /// Requested extrusion in mm.
        length_mm: f32,
    },
}

/// Motion planner.
///
/// Owns the producer side of a [`BlockQueue`] and drives a [`Stepper`] that
/// owns the consumer side. Create one with [`PlannerBuilder`].
pub struct Planner<'q, S, K, const N: usize> {
    config: PlannerConfig,
    constraints: MechanicalConstraints,
    coupling: MotorCoupling,
    junction: Junction,
    queue: Producer<'q, N>,
    stepper: S,
    kinematics: K,
    position: PositionTracker,
    previous_nominal_speed_sqr: f32,
    extruder_last_move: [u32; MAX_EXTRUDERS],
    diagnostics: Deque<Diagnostic, DIAGNOSTIC_CAPACITY>,
    dry_run: bool,
    simulation: bool,
}

impl<'q, S: Stepper, K: Kinematics, const N: usize> Planner<'q, S, K, N> {
    fn new(config: PlannerConfig, queue: Producer<'q, N>, stepper: S, kinematics: K) -> Self {
        let constraints = MechanicalConstraints::from_config(&config);
        let coupling = MotorCoupling::new(config.motion.coupling, config.motion.coupling_reversed);
        let junction = Junction::new(
            config.motion.junction.policy,
            config.motion.junction.deviation.value(),
            config.motion.junction.acos,
        );
        Self {
            config,
            constraints,
            coupling,
            junction,
            queue,
            stepper,
            kinematics,
            position: PositionTracker::new(),
            previous_nominal_speed_sqr: 0.0,
            extruder_last_move: [0; MAX_EXTRUDERS],
            diagnostics: Deque::new(),
            dry_run: false,
            simulation: false,
        }
    }

    // ========================================================================
    // Move requests
    // ========================================================================

    /// Queue a move to a Cartesian target `[x, y, z, e]` in mm.
    ///
    /// The target goes through the kinematics first. On kinematic machines
    /// the segment length is measured in Cartesian space unless
    /// `millimeters` is given.
    ///
    /// # Errors
    ///
    /// Rejects invalid requests, unreachable targets and moves during the
    /// quick-stop cooldown. Nothing is queued in that case.
    pub fn buffer_line(
        &mut self,
        target: [f32; NUM_AXES],
        feedrate: f32,
        extruder: u8,
        millimeters: Option<f32>,
    ) -> Result<Queued> {
        self.check_request(&target, feedrate, extruder)?;
        let machine = self.kinematics.transform(&[target[0], target[1], target[2]])?;

        let mut millimeters = millimeters;
        if millimeters.is_none() && self.kinematics.is_kinematic() {
            let from = self.position.cartesian();
            let dx = target[0] - from[0];
            let dy = target[1] - from[1];
            let dz = target[2] - from[2];
            millimeters = Some(if dx != 0.0 || dy != 0.0 {
                sqrtf(dx * dx + dy * dy + dz * dz)
            } else {
                dz.abs()
            });
        }

        let queued = self.buffer_segment(
            [machine[0], machine[1], machine[2], target[3]],
            feedrate,
            extruder,
            millimeters,
        )?;
        self.position.set_cartesian(target);
        Ok(queued)
    }

    /// Queue a move to an axis-space target `[a, b, c, e]` in mm, bypassing
    /// the kinematics.
    ///
    /// Returns [`Queued::Absorbed`] for moves too short to step and in
    /// simulation mode. Blocks while the queue is full.
    ///
    /// # Errors
    ///
    /// Rejects invalid requests and moves during the quick-stop cooldown.
    pub fn buffer_segment(
        &mut self,
        target: [f32; NUM_AXES],
        feedrate: f32,
        extruder: u8,
        millimeters: Option<f32>,
    ) -> Result<Queued> {
        self.check_request(&target, feedrate, extruder)?;
        if self.queue.is_cleaning() {
            return Err(PlannerError::Cleaning.into());
        }

        self.constraints.set_active_extruder(extruder);
        let mut steps = [0; NUM_AXES];
        for axis in Axis::ALL {
            steps[axis.index()] = self
                .constraints
                .mm_to_steps(axis, target[axis.index()], extruder);
        }

        let e = Axis::E.index();
        if self.dry_run || self.simulation {
            self.position.set_axis(Axis::E, steps[e], target[e]);
        }
        if self.simulation {
            self.position.set(steps, target);
            return Ok(Queued::Absorbed);
        }

        let segment = Segment {
            target: steps,
            target_machine: target,
            feedrate,
            extruder,
            millimeters,
        };
        let queued = if self.should_split(&steps) {
            self.buffer_split(&segment)
        } else {
            self.buffer_steps(&segment, false)
        };
        self.stepper.wake_up();
        Ok(queued)
    }

    fn check_request(&self, target: &[f32; NUM_AXES], feedrate: f32, extruder: u8) -> Result<()> {
        let count = self.config.extruder_count();
        if extruder >= count {
            return Err(PlannerError::InvalidExtruder {
                index: extruder,
                count,
            }
            .into());
        }
        if !feedrate.is_finite() || feedrate <= 0.0 {
            return Err(PlannerError::InvalidFeedrate(feedrate).into());
        }
        for axis in Axis::ALL {
            let value = target[axis.index()];
            let steps = value * self.constraints.axis_steps_per_mm(axis, extruder);
            if !value.is_finite() || steps.abs() >= MAX_TARGET_STEPS {
                return Err(PlannerError::InvalidTarget(axis).into());
            }
        }
        Ok(())
    }

    fn should_split(&self, target: &[i32; NUM_AXES]) -> bool {
        if !self.config.motion.split_first_move || self.queue.has_queued_blocks() {
            return false;
        }
        let delta = self.position.deltas_to(target);
        delta[..3].iter().any(|d| *d != 0)
    }

    fn buffer_split(&mut self, segment: &Segment) -> Queued {
        let (mid_steps, mid_machine) = self
            .position
            .midpoint(&segment.target, &segment.target_machine);
        let millimeters = segment.millimeters.map(|mm| mm * 0.5);

        let first = self.buffer_steps(
            &Segment {
                target: mid_steps,
                target_machine: mid_machine,
                millimeters,
                ..*segment
            },
            false,
        );
        let second = self.buffer_steps(
            &Segment {
                millimeters,
                ..*segment
            },
            true,
        );

        if first == Queued::Block || second == Queued::Block {
            Queued::Block
        } else {
            Queued::Absorbed
        }
    }

    fn buffer_steps(&mut self, segment: &Segment, split_move: bool) -> Queued {
        while self.queue.is_full() {
            self.stepper.idle();
        }

        let Some(block) = self.fill_block(segment, split_move) else {
            trace!("degenerate move absorbed");
            return Queued::Absorbed;
        };

        let index = self.push_block(&block);
        debug!(
            "queued block {} steps {} nominal rate {}",
            index,
            block.step_event_count,
            block.nominal_rate
        );

        let settings = self.recalc_settings();
        self.queue.recalculate(&settings);
        Queued::Block
    }

    fn push_block(&mut self, block: &Block) -> usize {
        let delay = self.config.queue.first_move_delay_polls;
        loop {
            if let Some(index) = self.queue.try_push(block, delay) {
                return index;
            }
            self.stepper.idle();
        }
    }

    fn recalc_settings(&self) -> RecalcSettings {
        RecalcSettings {
            min_planner_speed: self.config.motion.min_planner_speed.value(),
            profile: self.config.motion.profile,
            timer_rate_hz: self.config.motion.stepper_timer_rate_hz,
        }
    }

    // ========================================================================
    // Position
    // ========================================================================

    /// Set the position from Cartesian coordinates `[x, y, z, e]` in mm.
    ///
    /// # Errors
    ///
    /// Returns the kinematics error for unreachable positions.
    pub fn set_position_mm(&mut self, position: [f32; NUM_AXES]) -> Result<()> {
        let machine = self
            .kinematics
            .transform(&[position[0], position[1], position[2]])?;
        self.position.set_cartesian(position);
        self.set_machine_position_mm([machine[0], machine[1], machine[2], position[3]]);
        Ok(())
    }

    /// Set the position from axis-space coordinates `[a, b, c, e]` in mm.
    ///
    /// Queues a sync block while motion is pending, otherwise updates the
    /// stepper directly.
    pub fn set_machine_position_mm(&mut self, position: [f32; NUM_AXES]) {
        let extruder = self.constraints.active_extruder();
        let mut steps = [0; NUM_AXES];
        for axis in Axis::ALL {
            steps[axis.index()] = self
                .constraints
                .mm_to_steps(axis, position[axis.index()], extruder);
        }
        self.position.set(steps, position);

        if self.queue.has_queued_blocks() {
            self.buffer_sync_block();
        } else {
            self.stepper.set_position(&self.coupling.to_motors(&steps));
        }
    }

    /// Set the E position in mm.
    pub fn set_e_position_mm(&mut self, e: f32) {
        let extruder = self.constraints.active_extruder();
        let steps = self.constraints.mm_to_steps(Axis::E, e, extruder);
        self.position.set_axis(Axis::E, steps, e);
        self.position.set_cartesian_e(e);

        if self.queue.has_queued_blocks() {
            self.buffer_sync_block();
        } else {
            self.stepper.set_axis_position(Axis::E, steps);
        }
    }

    fn buffer_sync_block(&mut self) {
        let block = Block::sync(self.coupling.to_motors(self.position.steps()));
        let index = self.push_block(&block);
        debug!("sync block queued at {}", index);
        self.stepper.wake_up();
    }

    /// Executed position of `axis` in mm, read from the stepper.
    pub fn get_axis_position_mm(&self, axis: Axis) -> f32 {
        let motors = if self.coupling.is_coupled() {
            let _mask = masked(&self.stepper);
            Axis::ALL.map(|a| self.stepper.position(a))
        } else {
            Axis::ALL.map(|a| self.stepper.position(a))
        };
        self.axis_steps_to_mm(axis, &motors)
    }

    /// Position of `axis` in mm when its endstop last triggered.
    pub fn triggered_position_mm(&self, axis: Axis) -> f32 {
        let motors = Axis::ALL.map(|a| self.stepper.triggered_position(a));
        self.axis_steps_to_mm(axis, &motors)
    }

    fn axis_steps_to_mm(&self, axis: Axis, motors: &[i32; NUM_AXES]) -> f32 {
        let steps = self.coupling.axis_steps(axis, motors);
        self.constraints
            .steps_to_mm(axis, steps, self.constraints.active_extruder())
    }

    /// Forward an endstop hit to the stepper.
    pub fn endstop_triggered(&self, axis: Axis) {
        self.stepper.endstop_triggered(axis);
    }

    /// Planner position in steps (head space).
    pub fn position_steps(&self) -> &[i32; NUM_AXES] {
        self.position.steps()
    }

    /// Planner position in axis-space mm.
    pub fn position_mm(&self) -> &[f32; NUM_AXES] {
        self.position.machine()
    }

    // ========================================================================
    // Queue control
    // ========================================================================

    /// Some block is queued or executing.
    pub fn has_queued_blocks(&self) -> bool {
        self.queue.has_queued_blocks()
    }

    /// Queued blocks, including the one executing.
    pub fn moves_planned(&self) -> usize {
        self.queue.moves_planned()
    }

    /// Planned duration of the queued blocks in milliseconds.
    pub fn buffered_runtime_ms(&self) -> u32 {
        self.queue.buffered_runtime_us() / 1000
    }

    /// Wait until the queue has drained and the quick-stop cooldown is over.
    pub fn synchronize(&self) {
        while self.queue.has_queued_blocks() || self.queue.is_cleaning() {
            self.stepper.idle();
        }
    }

    /// Drain the queue, then release every motor.
    pub fn finish_and_disable(&self) {
        self.synchronize();
        for axis in Axis::LINEAR {
            self.stepper.disable_axis(axis);
        }
        for extruder in 0..self.config.extruder_count() {
            self.stepper.disable_extruder(extruder);
        }
    }

    /// Drop every queued block and abort the executing one.
    ///
    /// New moves are refused until the consumer has polled through the
    /// configured cooldown.
    pub fn quick_stop(&mut self) {
        {
            let _mask = masked(&self.stepper);
            self.queue.quick_stop(
                self.config.queue.first_move_delay_polls,
                self.config.queue.quick_stop_cooldown_polls,
            );
        }
        self.stepper.quick_stop();
        info!("quick stop");
    }

    /// Release idle motors that no queued block uses.
    pub fn check_axes_activity(&self) {
        let mut active = [false; NUM_AXES];
        let head = self.queue.head();
        let mut index = self.queue.tail();
        while index != head {
            let block = self.queue.block(index);
            for (flag, steps) in active.iter_mut().zip(block.steps) {
                *flag |= steps != 0;
            }
            index = BlockQueue::<N>::next_index(index);
        }

        let idle = self.config.queue.disable_idle_axes.as_array();
        for axis in Axis::LINEAR {
            if idle[axis.index()] && !active[axis.index()] {
                self.stepper.disable_axis(axis);
            }
        }
        if idle[Axis::E.index()] && !active[Axis::E.index()] {
            for extruder in 0..self.config.extruder_count() {
                self.stepper.disable_extruder(extruder);
            }
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Live configuration.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Live configuration for runtime changes.
    ///
    /// Call [`reset_acceleration_rates`](Self::reset_acceleration_rates)
    /// after changing accelerations and
    /// [`refresh_positioning`](Self::refresh_positioning) after changing
    /// steps per mm. Coupling and junction policy are fixed at build time.
    pub fn config_mut(&mut self) -> &mut PlannerConfig {
        &mut self.config
    }

    /// Derived step-space constraints.
    pub fn constraints(&self) -> &MechanicalConstraints {
        &self.constraints
    }

    /// Recompute step-space accelerations and the long-move cutoff.
    ///
    /// The live configuration is validated first; on error the previous
    /// constraints stay in force.
    pub fn reset_acceleration_rates(&mut self) -> Result<()> {
        validate_config(&self.config)?;
        let active = self.constraints.active_extruder();
        self.constraints = MechanicalConstraints::from_config(&self.config);
        self.constraints.set_active_extruder(active);
        info!(
            "acceleration rates reset, cutoff {} steps",
            self.constraints.cutoff_long
        );
        Ok(())
    }

    /// Recompute every derived scale and re-derive the step position from
    /// the float position.
    pub fn refresh_positioning(&mut self) -> Result<()> {
        self.reset_acceleration_rates()?;
        let position = *self.position.machine();
        self.set_machine_position_mm(position);
        Ok(())
    }

    /// Keep E out of every move.
    pub fn set_dry_run(&mut self, enabled: bool) {
        self.dry_run = enabled;
    }

    /// Whether dry run is on.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Consume moves without queuing anything.
    pub fn set_simulation(&mut self, enabled: bool) {
        self.simulation = enabled;
    }

    /// Whether simulation is on.
    pub fn is_simulation(&self) -> bool {
        self.simulation
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    /// Oldest undrained diagnostic.
    pub fn take_diagnostic(&mut self) -> Option<Diagnostic> {
        self.diagnostics.pop_front()
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        if self.diagnostics.is_full() {
            self.diagnostics.pop_front();
        }
        let _ = self.diagnostics.push_back(diagnostic);
    }

    /// Producer side of the queue.
    pub fn queue(&self) -> &Producer<'q, N> {
        &self.queue
    }

    /// The step generator.
    pub fn stepper(&self) -> &S {
        &self.stepper
    }

    /// The kinematics handler.
    pub fn kinematics(&self) -> &K {
        &self.kinematics
    }
}
