//! Discrete-event scheduling engine.
//!
//! `SimulationCore` owns all mutable state. Each step either starts stages
//! (one or a batch) after validating them against team occupancy, or pops
//! the next completion event and advances the clock to it.

mod actions;
mod constraints;
mod core;
mod duration;
mod events;
mod resource_pool;
mod state;

pub use actions::{batch_schemes, candidate_counts, Action, ActionEnumerator};
pub use constraints::{ConstraintEngine, Rejection};
pub use self::core::{
    Assignment, Observation, Plan, SimulationCore, SimulationError, StepResult, Validation,
};
pub use duration::{effort_duration, stage_duration};
pub use events::{CompletionEvent, EventQueue};
pub use resource_pool::{Allocation, ResourcePool};
pub use state::{SimulationState, StageStatus, StepState};
