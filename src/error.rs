//! Error types for stepper-planner.
//!
//! Only genuine failures are errors. Degenerate moves, a full queue and lost
//! races with the consumer are normal planner outcomes and never surface here.

use core::fmt;

use crate::motion::Axis;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all planner operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// A move request the planner refused
    Planner(PlannerError),
    /// Target rejected by the kinematic transform
    Kinematics(KinematicsError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Steps per millimeter must be > 0
    InvalidStepsPerMm {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Maximum feedrate must be > 0
    InvalidMaxFeedrate {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Maximum acceleration must be > 0
    InvalidMaxAcceleration {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Jerk limits must be >= 0
    InvalidJerk {
        /// Offending axis
        axis: Axis,
        /// Configured value
        value: f32,
    },
    /// Print, travel or retract acceleration must be > 0
    InvalidAcceleration(f32),
    /// Junction deviation must be >= 0
    InvalidJunctionDeviation(f32),
    /// Minimum planner speed must be > 0
    InvalidMinPlannerSpeed(f32),
    /// Minimum steps per segment must be >= 1
    InvalidMinStepsPerSegment(u32),
    /// Stepper timer rate must be > 0
    InvalidTimerRate(u32),
    /// Flow must be within (0, 1000] percent
    InvalidFlow(f32),
    /// At least one extruder is required
    NoExtruders,
    /// A block queue needs at least two slots
    InvalidQueueSize(usize),
    /// A required builder field was not set
    MissingField(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Move requests the planner refuses.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// Queue is cooling down after a quick stop
    Cleaning,
    /// Extruder index out of range
    InvalidExtruder {
        /// Requested extruder
        index: u8,
        /// Number of configured extruders
        count: u8,
    },
    /// Feedrate is negative or not finite
    InvalidFeedrate(f32),
    /// Target coordinate is not finite or beyond the step range
    InvalidTarget(Axis),
}

/// Kinematic transform errors.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Target lies outside the reachable envelope
    Unreachable {
        /// Axis that violates the envelope
        axis: Axis,
        /// Requested value
        value: f32,
        /// Limit that was exceeded
        limit: f32,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Planner(e) => write!(f, "Planner error: {}", e),
            Error::Kinematics(e) => write!(f, "Kinematics error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::InvalidStepsPerMm { axis, value } => {
                write!(f, "Invalid steps per mm on {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxFeedrate { axis, value } => {
                write!(f, "Invalid max feedrate on {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidMaxAcceleration { axis, value } => {
                write!(f, "Invalid max acceleration on {}: {}. Must be > 0", axis, value)
            }
            ConfigError::InvalidJerk { axis, value } => {
                write!(f, "Invalid jerk on {}: {}. Must be >= 0", axis, value)
            }
            ConfigError::InvalidAcceleration(v) => {
                write!(f, "Invalid acceleration: {}. Must be > 0", v)
            }
            ConfigError::InvalidJunctionDeviation(v) => {
                write!(f, "Invalid junction deviation: {}. Must be >= 0", v)
            }
            ConfigError::InvalidMinPlannerSpeed(v) => {
                write!(f, "Invalid minimum planner speed: {}. Must be > 0", v)
            }
            ConfigError::InvalidMinStepsPerSegment(v) => {
                write!(f, "Invalid minimum steps per segment: {}. Must be >= 1", v)
            }
            ConfigError::InvalidTimerRate(v) => write!(f, "Invalid stepper timer rate: {}", v),
            ConfigError::InvalidFlow(v) => write!(f, "Invalid flow: {}%. Must be 0-1000", v),
            ConfigError::NoExtruders => write!(f, "At least one extruder must be configured"),
            ConfigError::InvalidQueueSize(n) => {
                write!(f, "Invalid queue size: {}. Must be >= 2", n)
            }
            ConfigError::MissingField(field) => write!(f, "Missing required field: {}", field),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::Cleaning => write!(f, "Move rejected while the queue is cleaning"),
            PlannerError::InvalidExtruder { index, count } => {
                write!(f, "Extruder {} out of range ({} configured)", index, count)
            }
            PlannerError::InvalidFeedrate(v) => write!(f, "Invalid feedrate: {}", v),
            PlannerError::InvalidTarget(axis) => write!(f, "Target on {} is not finite or out of range", axis),
        }
    }
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::Unreachable { axis, value, limit } => {
                write!(f, "{} target {} outside reachable limit {}", axis, value, limit)
            }
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<PlannerError> for Error {
    fn from(e: PlannerError) -> Self {
        Error::Planner(e)
    }
}

impl From<KinematicsError> for Error {
    fn from(e: KinematicsError) -> Self {
        Error::Kinematics(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for PlannerError {}

#[cfg(feature = "std")]
impl std::error::Error for KinematicsError {}
