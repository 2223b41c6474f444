//! Planned motion blocks and their planning state.

use super::axis::{AxisBits, NUM_AXES};
use super::profile::{MotionPhase, SCurveTiming, Trapezoid};

/// What a queue slot carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockKind {
    /// A linear move.
    #[default]
    Motion,
    /// Zero-motion marker that rebases the consumer position in queue order.
    SyncPosition {
        /// Motor position to apply, in steps.
        position: [i32; NUM_AXES],
    },
}

/// One planned linear segment in step space.
///
/// Speeds are squared mm/s, rates are steps/s.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Block {
    /// Motion or position rebase.
    pub kind: BlockKind,
    /// Steps per motor (X/Y/Z are motors A/B/C on coupled machines).
    pub steps: [u32; NUM_AXES],
    /// Largest per-motor step count.
    pub step_event_count: u32,
    /// Motor directions, bit set for negative.
    pub direction: AxisBits,
    /// Logical head directions, bit set for negative.
    pub head_direction: AxisBits,
    /// Extruder driven by this block.
    pub extruder: u8,
    /// Segment length in mm.
    pub millimeters: f32,
    /// Cruise speed squared.
    pub nominal_speed_sqr: f32,
    /// Current entry speed squared.
    pub entry_speed_sqr: f32,
    /// Upper bound on the entry speed squared from the junction policy.
    pub max_entry_speed_sqr: f32,
    /// The block can reach nominal speed from and back to rest on its own.
    pub nominal_length: bool,
    /// Clamped acceleration in mm/s².
    pub acceleration: f32,
    /// Clamped acceleration in steps/s².
    pub acceleration_steps_per_s2: u32,
    /// Cruise rate in steps/s.
    pub nominal_rate: u32,
    /// Step boundaries and rates.
    pub trapezoid: Trapezoid,
    /// Time-domain parameters, present under the S-curve model.
    pub s_curve: Option<SCurveTiming>,
    /// Planned duration in microseconds.
    pub segment_time_us: u32,
}

impl Block {
    /// An all-zero motion block.
    pub const EMPTY: Self = Self {
        kind: BlockKind::Motion,
        steps: [0; NUM_AXES],
        step_event_count: 0,
        direction: AxisBits::EMPTY,
        head_direction: AxisBits::EMPTY,
        extruder: 0,
        millimeters: 0.0,
        nominal_speed_sqr: 0.0,
        entry_speed_sqr: 0.0,
        max_entry_speed_sqr: 0.0,
        nominal_length: false,
        acceleration: 0.0,
        acceleration_steps_per_s2: 0,
        nominal_rate: 0,
        trapezoid: Trapezoid {
            accelerate_until: 0,
            decelerate_after: 0,
            initial_rate: 0,
            cruise_rate: 0,
            final_rate: 0,
        },
        s_curve: None,
        segment_time_us: 0,
    };

    /// A sync block carrying a motor position.
    pub const fn sync(position: [i32; NUM_AXES]) -> Self {
        let mut block = Self::EMPTY;
        block.kind = BlockKind::SyncPosition { position };
        block
    }

    /// Whether this is a position-rebase marker.
    #[inline]
    pub const fn is_sync(&self) -> bool {
        matches!(self.kind, BlockKind::SyncPosition { .. })
    }

    /// Position carried by a sync block.
    pub const fn sync_position(&self) -> Option<[i32; NUM_AXES]> {
        match self.kind {
            BlockKind::SyncPosition { position } => Some(position),
            BlockKind::Motion => None,
        }
    }

    /// Phase at a given step index.
    pub fn phase_at(&self, step: u32) -> MotionPhase {
        if step >= self.step_event_count {
            MotionPhase::Complete
        } else if step < self.trapezoid.accelerate_until {
            MotionPhase::Accelerating
        } else if step < self.trapezoid.decelerate_after {
            MotionPhase::Cruising
        } else {
            MotionPhase::Decelerating
        }
    }

    /// Steps spent accelerating.
    #[inline]
    pub fn accel_steps(&self) -> u32 {
        self.trapezoid.accelerate_until
    }

    /// Steps spent cruising.
    #[inline]
    pub fn cruise_steps(&self) -> u32 {
        self.trapezoid
            .decelerate_after
            .saturating_sub(self.trapezoid.accelerate_until)
    }

    /// Steps spent decelerating.
    #[inline]
    pub fn decel_steps(&self) -> u32 {
        self.step_event_count
            .saturating_sub(self.trapezoid.decelerate_after)
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Planning state of a queue slot.
///
/// The producer owns `Free` and `Recalculate` slots, the consumer owns `Busy`
/// ones, and `Planned` slots may be taken by either side through a
/// compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BlockState {
    /// Unused.
    Free = 0,
    /// Queued; entry speed or trapezoid may still change.
    Recalculate = 1,
    /// Queued with a valid trapezoid; may be claimed by the consumer.
    Planned = 2,
    /// Claimed by the consumer; frozen.
    Busy = 3,
}

impl BlockState {
    /// Decode a raw state byte.
    #[inline]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BlockState::Recalculate,
            2 => BlockState::Planned,
            3 => BlockState::Busy,
            _ => BlockState::Free,
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Every state may return to `Free` (retire or quick stop).
    pub const fn allows(self, next: BlockState) -> bool {
        matches!(
            (self, next),
            (_, BlockState::Free)
                | (BlockState::Free, BlockState::Recalculate)
                | (BlockState::Planned, BlockState::Recalculate)
                | (BlockState::Recalculate, BlockState::Recalculate)
                | (BlockState::Recalculate, BlockState::Planned)
                | (BlockState::Planned, BlockState::Busy)
        )
    }

    /// Whether the producer may still edit the slot (possibly after a CAS).
    #[inline]
    pub const fn is_queued(self) -> bool {
        matches!(self, BlockState::Recalculate | BlockState::Planned)
    }
}
