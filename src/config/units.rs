//! Unit types for physical quantities.
//!
//! Provides type-safe representations of lengths, feedrates and
//! accelerations to prevent unit confusion at compile time.

use core::ops::{Add, Mul, Sub};

use serde::Deserialize;

/// Length in millimeters.
///
/// Used for configuration and the move API. Internally converted to steps.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Millimeters(pub f32);

impl Millimeters {
    /// Create a new Millimeters value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Convert to steps, rounding to nearest.
    #[inline]
    pub fn to_steps(self, steps_per_mm: f32) -> i32 {
        libm::floorf(self.0 * steps_per_mm + 0.5) as i32
    }

    /// Create from a step count.
    #[inline]
    pub fn from_steps(steps: f32, mm_per_step: f32) -> Self {
        Self(steps * mm_per_step)
    }
}

impl Add for Millimeters {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Millimeters {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Feedrate in millimeters per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MillimetersPerSec(pub f32);

impl MillimetersPerSec {
    /// Create a new MillimetersPerSec value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Squared value, as the planner compares speeds.
    #[inline]
    pub fn squared(self) -> f32 {
        self.0 * self.0
    }
}

impl Mul<f32> for MillimetersPerSec {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Acceleration in millimeters per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MillimetersPerSecSquared(pub f32);

impl MillimetersPerSecSquared {
    /// Create a new MillimetersPerSecSquared value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Convert to steps/s², rounding up.
    #[inline]
    pub fn to_steps(self, steps_per_mm: f32) -> u32 {
        libm::ceilf(self.0 * steps_per_mm) as u32
    }
}

impl Mul<f32> for MillimetersPerSecSquared {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Extension trait for creating unit types from primitives.
pub trait UnitExt {
    /// Convert to Millimeters.
    fn mm(self) -> Millimeters;
    /// Convert to MillimetersPerSec.
    fn mm_per_sec(self) -> MillimetersPerSec;
    /// Convert to MillimetersPerSecSquared.
    fn mm_per_sec_squared(self) -> MillimetersPerSecSquared;
}

impl UnitExt for f32 {
    #[inline]
    fn mm(self) -> Millimeters {
        Millimeters(self)
    }

    #[inline]
    fn mm_per_sec(self) -> MillimetersPerSec {
        MillimetersPerSec(self)
    }

    #[inline]
    fn mm_per_sec_squared(self) -> MillimetersPerSecSquared {
        MillimetersPerSecSquared(self)
    }
}
