//! Collaborator traits consumed by the assignment engine.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use async_trait::async_trait;
use delegate_core::{ActorId, GroupId, LoadMeasure, Task};

/// Error type for collaborator calls.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors that can occur while talking to an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The backend could not serve the request
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish in time
    #[error("Lookup timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested model or resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Resolves groups to their members.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Members of `group`, in directory order. Unknown groups have no members.
    async fn members_of(&self, group: &GroupId) -> Result<Vec<ActorId>>;
}

/// Derives the skill a task requires from its inputs.
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    /// Evaluate the rules. `inputs` already carries the task name under
    /// `taskName`. `Ok(None)` means no rule produced a skill.
    async fn derive_requirement(
        &self,
        task_name: &str,
        inputs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Option<String>>;
}

/// Looks up which actors hold a skill.
#[async_trait]
pub trait SkillDecisionService: Send + Sync {
    /// Actors qualified for `skill` according to decision model `model`.
    async fn qualified_users(&self, model: &str, skill: &str) -> Result<HashSet<ActorId>>;
}

/// Pluggable workload metric.
#[async_trait]
pub trait LoadMetric: Send + Sync {
    /// Identifier used to select this metric from configuration.
    fn identifier(&self) -> &str;

    /// Measure the load of `actors`. Actors without data may be missing from
    /// the result.
    async fn load_of(&self, actors: &[ActorId], task: &Task) -> Result<Vec<LoadMeasure>>;

    /// Ordering used to pick the least loaded actor. Defaults to the
    /// total order of [`LoadMeasure`]: load, then task count, then actor id.
    fn compare(&self, a: &LoadMeasure, b: &LoadMeasure) -> Ordering {
        a.cmp(b)
    }
}

/// A backend whose deployed release can be re-scanned for updates.
#[async_trait]
pub trait Refreshable: Send + Sync {
    /// Short label for logs.
    fn label(&self) -> &str;

    /// Pick up a newer release if one is available.
    async fn refresh(&self) -> Result<()>;
}
