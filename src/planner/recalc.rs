//! Look-ahead recalculation over the queued blocks.
//!
//! After every insertion the planner runs a reverse pass (newest to oldest,
//! lowering entry speeds so every block can brake in time), a forward pass
//! (oldest to newest, lowering entry speeds the previous block cannot reach)
//! and a trapezoid refresh of every block whose speeds changed.
//!
//! Only slots between `planned` and `head` are revisited. Blocks the
//! consumer has claimed are never touched; a block lost to the consumer
//! mid-pass is skipped.

use libm::sqrtf;

use super::buffer::{BlockQueue, Producer};
use crate::motion::{max_allowable_speed_sqr, BlockState, ProfileModel, SCurveTiming, Trapezoid};

/// Parameters the passes need from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecalcSettings {
    /// Speed assumed at the end of the queue, in mm/s.
    pub min_planner_speed: f32,
    /// Velocity profile model.
    pub profile: ProfileModel,
    /// Stepper timer frequency for S-curve timing.
    pub timer_rate_hz: u32,
}

impl RecalcSettings {
    #[inline]
    fn min_planner_speed_sqr(&self) -> f32 {
        self.min_planner_speed * self.min_planner_speed
    }
}

impl<const N: usize> Producer<'_, N> {
    /// Re-plan the queue after a block was added.
    pub fn recalculate(&mut self, settings: &RecalcSettings) {
        let last = BlockQueue::<N>::prev_index(self.head());
        if last != self.planned() {
            self.reverse_pass(settings);
            self.forward_pass();
        }
        self.recalculate_trapezoids(settings);
    }

    fn reverse_pass(&mut self, settings: &RecalcSettings) {
        let head = self.head();
        let mut planned = self.planned();
        if planned == head {
            return;
        }

        let mut index = BlockQueue::<N>::prev_index(head);
        let mut next: Option<usize> = None;
        while index != planned {
            if !self.block(index).is_sync() {
                self.reverse_pass_kernel(index, next, settings);
                next = Some(index);
            }
            index = BlockQueue::<N>::prev_index(index);

            // The consumer may have pushed `planned` past us meanwhile.
            loop {
                let current = self.planned();
                if planned == current {
                    break;
                }
                if index == planned {
                    return;
                }
                planned = BlockQueue::<N>::next_index(planned);
            }
        }
    }

    fn reverse_pass_kernel(&mut self, index: usize, next: Option<usize>, settings: &RecalcSettings) {
        let block = *self.block(index);
        let next_recalculating = next.is_some_and(|n| self.state(n) == BlockState::Recalculate);
        if block.entry_speed_sqr == block.max_entry_speed_sqr && !next_recalculating {
            return;
        }

        let new_entry_speed_sqr = if block.nominal_length {
            block.max_entry_speed_sqr
        } else {
            let exit_speed_sqr = next.map_or(settings.min_planner_speed_sqr(), |n| {
                self.block(n).entry_speed_sqr
            });
            block.max_entry_speed_sqr.min(max_allowable_speed_sqr(
                -block.acceleration,
                exit_speed_sqr,
                block.millimeters,
            ))
        };

        if block.entry_speed_sqr != new_entry_speed_sqr {
            if let Some(editing) = self.begin_edit(index) {
                editing.entry_speed_sqr = new_entry_speed_sqr;
            }
        }
    }

    fn forward_pass(&mut self) {
        let head = self.head();
        let mut index = self.planned();
        let mut previous: Option<usize> = None;
        while index != head {
            if !self.block(index).is_sync() {
                let frozen = previous.is_some_and(|p| {
                    matches!(self.state(p), BlockState::Busy | BlockState::Free)
                });
                if !frozen {
                    self.forward_pass_kernel(previous, index);
                }
                previous = Some(index);
            }
            index = BlockQueue::<N>::next_index(index);
        }
    }

    fn forward_pass_kernel(&mut self, previous: Option<usize>, index: usize) {
        let Some(previous) = previous else {
            return;
        };
        let prev = *self.block(previous);
        let entry_speed_sqr = self.block(index).entry_speed_sqr;

        if !prev.nominal_length && prev.entry_speed_sqr < entry_speed_sqr {
            let new_entry_speed_sqr =
                max_allowable_speed_sqr(-prev.acceleration, prev.entry_speed_sqr, prev.millimeters);
            if new_entry_speed_sqr < entry_speed_sqr {
                if let Some(editing) = self.begin_edit(index) {
                    editing.entry_speed_sqr = new_entry_speed_sqr;
                    self.advance_planned(index);
                }
            }
        }

        let block = self.block(index);
        if block.entry_speed_sqr == block.max_entry_speed_sqr {
            self.advance_planned(index);
        }
    }

    fn recalculate_trapezoids(&mut self, settings: &RecalcSettings) {
        let tail = self.tail();
        let mut head = self.head();
        while head != tail {
            let prev = BlockQueue::<N>::prev_index(head);
            if !self.block(prev).is_sync() {
                break;
            }
            head = prev;
        }

        let mut index = tail;
        let mut current: Option<usize> = None;
        let mut current_entry_speed = 0.0;
        let mut next_entry_speed = 0.0;
        while index != head {
            if !self.block(index).is_sync() {
                next_entry_speed = sqrtf(self.block(index).entry_speed_sqr);
                if let Some(cur) = current {
                    let cur_state = self.state(cur);
                    if cur_state != BlockState::Busy
                        && (cur_state == BlockState::Recalculate
                            || self.state(index) == BlockState::Recalculate)
                    {
                        self.refresh_trapezoid(cur, current_entry_speed, next_entry_speed, settings);
                    }
                }
                current = Some(index);
                current_entry_speed = next_entry_speed;
            }
            index = BlockQueue::<N>::next_index(index);
        }

        // The executing block keeps the profile it was claimed with.
        if let Some(last) = current.filter(|&i| self.state(i) != BlockState::Busy) {
            self.refresh_trapezoid(last, next_entry_speed, settings.min_planner_speed, settings);
        }
    }

    fn refresh_trapezoid(
        &mut self,
        index: usize,
        entry_speed: f32,
        exit_speed: f32,
        settings: &RecalcSettings,
    ) {
        let Some(block) = self.begin_edit(index) else {
            return;
        };

        let inverse_nominal_speed = 1.0 / sqrtf(block.nominal_speed_sqr);
        block.trapezoid = Trapezoid::compute(
            block.step_event_count,
            block.nominal_rate,
            block.acceleration_steps_per_s2,
            entry_speed * inverse_nominal_speed,
            exit_speed * inverse_nominal_speed,
        );
        block.s_curve = match settings.profile {
            ProfileModel::Trapezoid => None,
            ProfileModel::SCurve => Some(SCurveTiming::from_trapezoid(
                &block.trapezoid,
                block.acceleration_steps_per_s2,
                settings.timer_rate_hz,
            )),
        };

        self.publish(index);
    }
}
