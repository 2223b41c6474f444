//! # stepper-planner
//!
//! Look-ahead motion planner for stepper-driven 3D printers and CNC machines.
//!
//! ## Features
//!
//! - **Look-ahead planning**: Entry speeds are re-optimized across the queue
//!   after every move
//! - **Lock-free queue**: Single-producer single-consumer ring shared with
//!   the step generator, no critical sections on the hot path
//! - **Junction policies**: Junction deviation or classic per-axis jerk
//! - **Core kinematics**: Cartesian, CoreXY, CoreXZ and CoreYZ belt coupling
//! - **Configuration-driven**: Axes, extruders and tuning in TOML files
//! - **no_std compatible**: Core library works without standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_planner::{BlockQueue, PlannerBuilder};
//!
//! // Load configuration from TOML
//! let config = stepper_planner::load_config("printer.toml")?;
//!
//! // The step generator owns the consumer side of the queue
//! let mut queue: BlockQueue<16> = BlockQueue::new();
//! let (producer, consumer) = queue.split();
//!
//! let mut planner = PlannerBuilder::new()
//!     .from_config(&config)
//!     .stepper(&stepper)
//!     .build(producer)?;
//!
//! // Queue a printing move to X=10, E=0.5 at 50 mm/s
//! planner.buffer_line([10.0, 0.0, 0.2, 0.5], 50.0, 0, None)?;
//! planner.synchronize();
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O, TOML parsing and `tracing` logs
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[macro_use]
mod logging;

// Core modules
pub mod config;
pub mod error;
pub mod motion;
pub mod planner;

// Re-exports for ergonomic API
pub use config::{validate_config, MechanicalConstraints, PlannerConfig};
pub use error::{Error, Result};
pub use motion::{
    Axis, Block, BlockExecutor, BlockState, Coupling, JunctionPolicyKind, MotionPhase,
    ProfileModel, Trapezoid,
};
pub use planner::{
    masked, BlockQueue, Cartesian, ClaimedBlock, Consumer, Diagnostic, Kinematics, Planner,
    PlannerBuilder, Producer, Queued, Stepper,
};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Millimeters, MillimetersPerSec, MillimetersPerSecSquared};
