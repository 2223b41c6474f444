//! Motion module for stepper-planner.
//!
//! Pure data model and math: blocks, velocity profiles, junction policies,
//! motor coupling and the reference block executor. Nothing here shares
//! state with the consumer.

mod axis;
mod block;
mod coupling;
mod executor;
pub mod fastmath;
mod junction;
mod profile;

pub use axis::{Axis, AxisBits, NUM_AXES};
pub use block::{Block, BlockKind, BlockState};
pub use coupling::{Coupling, MotorCoupling};
pub use executor::BlockExecutor;
pub use junction::{
    limit_value_by_axis_maximum, normalize_junction_vector, ClassicJerk, Junction,
    JunctionDeviation, JunctionInput, JunctionPolicy, JunctionPolicyKind, JUNCTION_COS_LIMIT,
};
pub use profile::{
    estimate_acceleration_distance, final_speed, intersection_distance, max_allowable_speed_sqr,
    MotionPhase, ProfileModel, SCurveTiming, Trapezoid, MINIMAL_STEP_RATE,
};
