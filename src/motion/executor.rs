//! Reference block execution - step rate generation.

use super::block::Block;
use super::profile::MotionPhase;

/// Runtime state while walking a claimed block step by step.
///
/// Mirrors what a step generator does: the rate ramps linearly in time while
/// accelerating or decelerating and is clamped to the trapezoid rates.
#[derive(Debug, Clone)]
pub struct BlockExecutor {
    /// The block being executed.
    block: Block,

    /// Current step number (0 to step_event_count - 1).
    current_step: u32,

    /// Current step rate in steps/s.
    current_rate: u32,

    /// Time spent in the current ramp, in seconds.
    ramp_time: f32,

    /// Time spent in the block so far, in seconds.
    elapsed: f32,

    /// Current phase of motion.
    phase: MotionPhase,
}

impl BlockExecutor {
    /// Create a new executor for a block.
    pub fn new(block: Block) -> Self {
        let mut executor = Self {
            block,
            current_step: 0,
            current_rate: 0,
            ramp_time: 0.0,
            elapsed: 0.0,
            phase: MotionPhase::Complete,
        };
        executor.reset();
        executor
    }

    /// Check if the block is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.phase == MotionPhase::Complete
    }

    /// Get the current step number.
    #[inline]
    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    /// Get steps remaining.
    #[inline]
    pub fn steps_remaining(&self) -> u32 {
        self.block.step_event_count.saturating_sub(self.current_step)
    }

    /// Get the current phase.
    #[inline]
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Get the current step rate in steps/s.
    #[inline]
    pub fn current_rate(&self) -> u32 {
        self.current_rate
    }

    /// Get the current step interval in nanoseconds.
    #[inline]
    pub fn current_interval_ns(&self) -> u32 {
        if self.current_rate == 0 {
            u32::MAX
        } else {
            1_000_000_000 / self.current_rate
        }
    }

    /// Time spent executing so far, in seconds.
    #[inline]
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed
    }

    /// Get the block.
    #[inline]
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Advance to the next step.
    ///
    /// Returns `true` if a step should be executed, `false` if complete.
    pub fn advance(&mut self) -> bool {
        if self.is_complete() {
            return false;
        }

        let dt = 1.0 / self.current_rate.max(1) as f32;
        self.elapsed += dt;
        self.current_step += 1;

        if self.current_step >= self.block.step_event_count {
            self.phase = MotionPhase::Complete;
            self.current_rate = 0;
            return false;
        }

        let next = self.block.phase_at(self.current_step);
        if next != self.phase {
            self.ramp_time = 0.0;
        } else {
            self.ramp_time += dt;
        }
        self.phase = next;
        self.current_rate = self.rate_for(next);

        true
    }

    fn rate_for(&self, phase: MotionPhase) -> u32 {
        let t = &self.block.trapezoid;
        let accel = self.block.acceleration_steps_per_s2 as f32;
        match phase {
            MotionPhase::Accelerating => {
                let rate = t.initial_rate as f32 + accel * self.ramp_time;
                (rate as u32).clamp(t.initial_rate, t.cruise_rate.max(t.initial_rate))
            }
            MotionPhase::Cruising => t.cruise_rate,
            MotionPhase::Decelerating => {
                let rate = t.cruise_rate as f32 - accel * self.ramp_time;
                let floor = t.final_rate.min(t.cruise_rate);
                (rate.max(0.0) as u32).clamp(floor, t.cruise_rate.max(floor))
            }
            MotionPhase::Complete => 0,
        }
    }

    /// Reset the executor to the beginning.
    pub fn reset(&mut self) {
        self.current_step = 0;
        self.ramp_time = 0.0;
        self.elapsed = 0.0;
        self.phase = self.block.phase_at(0);
        self.current_rate = match self.phase {
            MotionPhase::Complete => 0,
            MotionPhase::Accelerating => self.block.trapezoid.initial_rate,
            phase => self.rate_for(phase),
        };
    }

    /// Get progress as a fraction (0.0 to 1.0).
    #[inline]
    pub fn progress(&self) -> f32 {
        if self.block.step_event_count == 0 {
            1.0
        } else {
            self.current_step as f32 / self.block.step_event_count as f32
        }
    }
}
