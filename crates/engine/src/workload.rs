//! Workload balancing: pick the least loaded candidate.

use std::sync::Arc;
use std::time::Duration;
use delegate_core::{ActorId, CandidateSet, Task};
use delegate_services::LoadMetric;
use tracing::{debug, warn};

use crate::lookup::bounded;

/// Optional stage choosing the candidate with the lowest load.
#[derive(Clone)]
pub struct WorkloadSelector {
    metric: Arc<dyn LoadMetric>,
    timeout: Option<Duration>,
}

impl WorkloadSelector {
    /// Create a selector ranking by `metric`.
    pub fn new(metric: Arc<dyn LoadMetric>) -> Self {
        Self {
            metric,
            timeout: None,
        }
    }

    /// Bound the metric call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Identifier of the metric in use.
    pub fn metric_identifier(&self) -> &str {
        self.metric.identifier()
    }

    /// The least loaded candidate, or `None` when there are no candidates or
    /// the metric has no usable data.
    ///
    /// Measures are ranked with [`LoadMetric::compare`], so a metric that
    /// keeps the default ordering breaks load ties by task count and then by
    /// actor id.
    pub async fn select_least_loaded(&self, candidates: &CandidateSet, task: &Task) -> Option<ActorId> {
        if candidates.is_empty() {
            return None;
        }

        let measures = match bounded(self.timeout, self.metric.load_of(candidates.as_slice(), task)).await {
            Ok(measures) => measures,
            Err(e) => {
                warn!(
                    task = %task.id,
                    metric = self.metric.identifier(),
                    error = %e,
                    "Load lookup failed, skipping workload selection"
                );
                return None;
            }
        };

        let lightest = measures
            .into_iter()
            .filter(|m| candidates.contains(&m.actor))
            .min_by(|a, b| self.metric.compare(a, b));

        match lightest {
            Some(m) => {
                debug!(task = %task.id, actor = %m.actor, load = m.load, "Least loaded candidate found");
                Some(m.actor)
            }
            None => {
                debug!(task = %task.id, metric = self.metric.identifier(), "No load data for candidates");
                None
            }
        }
    }
}
