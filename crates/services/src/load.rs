//! Built-in load metrics and the metric registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use async_trait::async_trait;
use delegate_core::{ActorId, LoadMeasure, Task};
use tracing::debug;

use crate::trait_::{LoadMetric, Result};

/// Identifier of [`TaskCountLoadMetric`].
pub const TASK_COUNT_METRIC: &str = "task-count";

/// Identifier of [`NoDataLoadMetric`].
pub const NO_DATA_METRIC: &str = "none";

/// Source of open task counts per actor.
#[async_trait]
pub trait OpenTaskSource: Send + Sync {
    /// Open task count of each actor. Actors without data may be missing.
    async fn open_task_counts(&self, actors: &[ActorId]) -> Result<HashMap<ActorId, u64>>;
}

/// Load equals the number of tasks an actor currently owns.
pub struct TaskCountLoadMetric {
    source: Arc<dyn OpenTaskSource>,
}

impl TaskCountLoadMetric {
    /// Create a metric reading from `source`.
    pub fn new(source: Arc<dyn OpenTaskSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl LoadMetric for TaskCountLoadMetric {
    fn identifier(&self) -> &str {
        TASK_COUNT_METRIC
    }

    async fn load_of(&self, actors: &[ActorId], task: &Task) -> Result<Vec<LoadMeasure>> {
        let counts = self.source.open_task_counts(actors).await?;
        debug!(task = %task.id, known = counts.len(), asked = actors.len(), "Open task counts fetched");

        Ok(actors
            .iter()
            .filter_map(|a| counts.get(a).map(|c| LoadMeasure::from_task_count(a.clone(), *c)))
            .collect())
    }
}

/// Metric that never has data. Selecting it turns workload balancing into a
/// no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDataLoadMetric;

#[async_trait]
impl LoadMetric for NoDataLoadMetric {
    fn identifier(&self) -> &str {
        NO_DATA_METRIC
    }

    async fn load_of(&self, _actors: &[ActorId], _task: &Task) -> Result<Vec<LoadMeasure>> {
        Ok(Vec::new())
    }
}

type MetricFactory = Box<dyn Fn() -> Arc<dyn LoadMetric> + Send + Sync>;

/// Registry of load metric factories, keyed by identifier.
///
/// The configured metric is looked up once when the strategy is built.
pub struct LoadMetricRegistry {
    factories: BTreeMap<String, MetricFactory>,
}

impl LoadMetricRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the built-in metrics. `open_tasks` feeds the task-count
    /// metric.
    pub fn with_builtins(open_tasks: Arc<dyn OpenTaskSource>) -> Self {
        let mut registry = Self::new();
        registry.register(TASK_COUNT_METRIC, move || {
            Arc::new(TaskCountLoadMetric::new(open_tasks.clone())) as Arc<dyn LoadMetric>
        });
        registry.register(NO_DATA_METRIC, || Arc::new(NoDataLoadMetric) as Arc<dyn LoadMetric>);
        registry
    }

    /// Register a factory, replacing any previous one with the same id.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn LoadMetric> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// Build the metric registered under `id`.
    pub fn create(&self, id: &str) -> Option<Arc<dyn LoadMetric>> {
        self.factories.get(id).map(|factory| factory())
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for LoadMetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}
