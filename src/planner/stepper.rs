//! Step generator collaborator.
//!
//! The planner never emits steps itself. It drives a [`Stepper`] that owns
//! the consumer side of the block queue and reports executed positions.

use crate::motion::{Axis, NUM_AXES};

/// Interface the planner consumes from the step generator.
///
/// Every method takes `&self`: implementations live next to an interrupt
/// handler or another thread and keep their state in atomics or cells.
/// Positions are motor-space step counts.
pub trait Stepper {
    /// Make sure the consumer is running.
    fn wake_up(&self);

    /// Executed step count of a motor.
    fn position(&self, axis: Axis) -> i32;

    /// Step count latched when the endstop of `axis` last triggered.
    fn triggered_position(&self, axis: Axis) -> i32;

    /// Overwrite the executed step counts.
    fn set_position(&self, position: &[i32; NUM_AXES]);

    /// Overwrite the executed step count of one motor.
    fn set_axis_position(&self, axis: Axis, position: i32);

    /// Abort the block being executed.
    fn quick_stop(&self);

    /// Record the endstop position of `axis` and drop the current block.
    fn endstop_triggered(&self, axis: Axis);

    /// Energize a motor.
    fn enable_axis(&self, axis: Axis);

    /// Release a motor.
    fn disable_axis(&self, axis: Axis);

    /// Energize an extruder motor.
    fn enable_extruder(&self, extruder: u8);

    /// Release an extruder motor.
    fn disable_extruder(&self, extruder: u8);

    /// Keep the consumer from running until [`Stepper::unmask_consumer`].
    fn mask_consumer(&self);

    /// Let the consumer run again.
    fn unmask_consumer(&self);

    /// Producer-side housekeeping while waiting on the consumer.
    fn idle(&self) {
        core::hint::spin_loop();
    }

    /// Whether `extruder` is too cold to extrude.
    fn is_cold(&self, _extruder: u8) -> bool {
        false
    }
}

impl<T: Stepper + ?Sized> Stepper for &T {
    fn wake_up(&self) {
        (**self).wake_up()
    }

    fn position(&self, axis: Axis) -> i32 {
        (**self).position(axis)
    }

    fn triggered_position(&self, axis: Axis) -> i32 {
        (**self).triggered_position(axis)
    }

    fn set_position(&self, position: &[i32; NUM_AXES]) {
        (**self).set_position(position)
    }

    fn set_axis_position(&self, axis: Axis, position: i32) {
        (**self).set_axis_position(axis, position)
    }

    fn quick_stop(&self) {
        (**self).quick_stop()
    }

    fn endstop_triggered(&self, axis: Axis) {
        (**self).endstop_triggered(axis)
    }

    fn enable_axis(&self, axis: Axis) {
        (**self).enable_axis(axis)
    }

    fn disable_axis(&self, axis: Axis) {
        (**self).disable_axis(axis)
    }

    fn enable_extruder(&self, extruder: u8) {
        (**self).enable_extruder(extruder)
    }

    fn disable_extruder(&self, extruder: u8) {
        (**self).disable_extruder(extruder)
    }

    fn mask_consumer(&self) {
        (**self).mask_consumer()
    }

    fn unmask_consumer(&self) {
        (**self).unmask_consumer()
    }

    fn idle(&self) {
        (**self).idle()
    }

    fn is_cold(&self, extruder: u8) -> bool {
        (**self).is_cold(extruder)
    }
}

/// Consumer mask held for a scope; unmasks on drop.
#[must_use = "the consumer is unmasked as soon as the guard is dropped"]
pub struct ConsumerMask<'a, S: Stepper + ?Sized> {
    stepper: &'a S,
}

/// Mask the consumer until the returned guard is dropped.
pub fn masked<S: Stepper + ?Sized>(stepper: &S) -> ConsumerMask<'_, S> {
    stepper.mask_consumer();
    ConsumerMask { stepper }
}

impl<S: Stepper + ?Sized> Drop for ConsumerMask<'_, S> {
    fn drop(&mut self) {
        self.stepper.unmask_consumer();
    }
}
