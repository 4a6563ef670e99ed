//! Assignment outcome and workload measures.

use std::cmp::Ordering;
use serde::{Deserialize, Serialize};
use crate::id::{ActorId, ResolutionId, TaskId};
use crate::Time;

/// How the final assignee was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPath {
    /// Least-loaded candidate according to the load metric
    Workload,

    /// First candidate in declaration order
    Fallback,
}

impl DecisionPath {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionPath::Workload => "workload",
            DecisionPath::Fallback => "fallback",
        }
    }
}

/// The result of a successful resolution. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    actor: ActorId,
    task: TaskId,
    strategy: String,
    decided_by: DecisionPath,
    resolution: ResolutionId,
    decided_at: Time,
}

impl Assignment {
    /// Record a decision.
    pub fn new(
        actor: ActorId,
        task: TaskId,
        strategy: impl Into<String>,
        decided_by: DecisionPath,
        resolution: ResolutionId,
    ) -> Self {
        Self {
            actor,
            task,
            strategy: strategy.into(),
            decided_by,
            resolution,
            decided_at: chrono::Utc::now(),
        }
    }

    /// The chosen owner.
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// The task that was assigned.
    pub fn task(&self) -> &TaskId {
        &self.task
    }

    /// Identifier of the strategy that produced this assignment.
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Which stage made the final choice.
    pub fn decided_by(&self) -> DecisionPath {
        self.decided_by
    }

    /// Resolution run that produced this assignment.
    pub fn resolution(&self) -> ResolutionId {
        self.resolution
    }

    /// When the decision was made.
    pub fn decided_at(&self) -> Time {
        self.decided_at
    }
}

/// Workload of one actor as reported by a load metric.
///
/// Measures are totally ordered: by `load`, then `task_count`, then actor id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadMeasure {
    /// Actor the measure belongs to
    pub actor: ActorId,

    /// Normalised load (lower is less busy)
    pub load: f64,

    /// Number of tasks counted towards the load
    pub task_count: u64,
}

impl LoadMeasure {
    /// Create a measure.
    pub fn new(actor: impl Into<ActorId>, load: f64, task_count: u64) -> Self {
        Self {
            actor: actor.into(),
            load,
            task_count,
        }
    }

    /// Measure where load equals the task count.
    pub fn from_task_count(actor: impl Into<ActorId>, task_count: u64) -> Self {
        Self::new(actor, task_count as f64, task_count)
    }
}

impl PartialEq for LoadMeasure {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LoadMeasure {}

impl PartialOrd for LoadMeasure {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LoadMeasure {
    fn cmp(&self, other: &Self) -> Ordering {
        self.load
            .total_cmp(&other.load)
            .then_with(|| self.task_count.cmp(&other.task_count))
            .then_with(|| self.actor.cmp(&other.actor))
    }
}
