//! Error types crossing the engine boundary.
//!
//! Collaborator failures never show up here: each stage absorbs and logs
//! them. Only configuration problems and the "nobody is eligible" outcome
//! reach the caller.

use delegate_core::TaskId;
use crate::strategy::Stage;

/// Fatal configuration problems, detected when the strategy is built.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Release coordinates are not `group:artifact:version`
    #[error("Invalid release id for {key}: '{value}' (expected group:artifact:version)")]
    InvalidReleaseId {
        /// Property or setting name
        key: String,
        /// Rejected value
        value: String,
    },

    /// Scanner interval is not a positive number of milliseconds
    #[error("Invalid scanner interval for {key}: '{value}'")]
    InvalidInterval {
        /// Property or setting name
        key: String,
        /// Rejected value
        value: String,
    },

    /// A boolean setting could not be parsed
    #[error("Invalid flag for {key}: '{value}'")]
    InvalidFlag {
        /// Property or setting name
        key: String,
        /// Rejected value
        value: String,
    },

    /// No load metric registered under this identifier
    #[error("Unknown load calculator '{name}' (known: {known})")]
    UnknownCalculator {
        /// Requested identifier
        name: String,
        /// Registered identifiers, comma separated
        known: String,
    },

    /// A setting required by the active features is missing
    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    /// A collaborator required by the active features was not supplied
    #[error("Missing collaborator: {0}")]
    MissingService(&'static str),

    /// I/O error while reading a config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors returned by an assignment strategy.
#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    /// Nobody is eligible for the task
    #[error("No eligible candidate for task {task} after {stage}")]
    NoEligibleCandidate {
        /// Task left without an owner
        task: TaskId,
        /// Stage after which nobody was left
        stage: Stage,
    },

    /// Strategy could not be built
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AssignmentError {
    /// Whether this is the "no assignee" outcome.
    pub fn is_no_eligible_candidate(&self) -> bool {
        matches!(self, Self::NoEligibleCandidate { .. })
    }
}
