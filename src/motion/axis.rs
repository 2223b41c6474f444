//! Logical axes and compact per-axis bit sets.

use core::fmt;

/// Number of axes the planner tracks (X, Y, Z and the active extruder).
pub const NUM_AXES: usize = 4;

/// A planner axis.
///
/// For coupled machines X/Y/Z also name the motors (A/B/C) once the
/// coupling transform has been applied; the meaning follows context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// X axis (motor A on coupled machines).
    X = 0,
    /// Y axis (motor B on coupled machines).
    Y = 1,
    /// Z axis (motor C on coupled machines).
    Z = 2,
    /// Active extruder.
    E = 3,
}

impl Axis {
    /// All axes in storage order.
    pub const ALL: [Axis; NUM_AXES] = [Axis::X, Axis::Y, Axis::Z, Axis::E];

    /// The three linear axes.
    pub const LINEAR: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Array index of this axis.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Axis for an array index.
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            3 => Some(Axis::E),
            _ => None,
        }
    }

    /// Single-letter name.
    pub const fn name(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
            Axis::E => "E",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of axes packed into one byte.
///
/// Used for direction bits (bit set = negative direction) and for
/// enable/activity masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisBits(u8);

impl AxisBits {
    /// No axis set.
    pub const EMPTY: Self = Self(0);

    /// Build from a raw bit pattern.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0F)
    }

    /// Raw bit pattern.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Mark an axis.
    #[inline]
    pub fn set(&mut self, axis: Axis) {
        self.0 |= 1 << axis.index();
    }

    /// Whether an axis is marked.
    #[inline]
    pub const fn contains(self, axis: Axis) -> bool {
        self.0 & (1 << axis.index()) != 0
    }

    /// Whether no axis is marked.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bits for every negative entry of a delta vector.
    pub fn negative(deltas: &[i32; NUM_AXES]) -> Self {
        let mut bits = Self::EMPTY;
        for axis in Axis::ALL {
            if deltas[axis.index()] < 0 {
                bits.set(axis);
            }
        }
        bits
    }
}
