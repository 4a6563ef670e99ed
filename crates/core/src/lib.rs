//! Delegate core data models.
//!
//! This crate defines the entities, the assignment graph and the values
//! produced while resolving who should own a task.

#![warn(missing_docs)]

// Core identities
mod id;

// Assignment graph
mod entity;
mod task;

// Resolution values
mod candidates;
mod assignment;

// Re-exports
pub use id::*;

pub use entity::{AssignableEntity, PeopleAssignments};
pub use task::{Task, TASK_NAME_VARIABLE, WORKLOAD_OVERRIDE_VARIABLE};
pub use candidates::{CandidateSet, ExcludedSet};
pub use assignment::{Assignment, DecisionPath, LoadMeasure};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
