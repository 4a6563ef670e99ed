//! Skill matching: narrow candidates to those qualified for the task.

use std::sync::Arc;
use std::time::Duration;
use delegate_core::{CandidateSet, Task};
use delegate_services::{RuleEvaluator, SkillDecisionService};
use tracing::{debug, warn};

use crate::lookup::bounded;

/// Optional stage restricting candidates to actors holding the skill the
/// task requires.
///
/// Fails open: if no skill can be derived, or the decision lookup fails, the
/// candidates pass through unchanged.
#[derive(Clone)]
pub struct SkillFilter {
    rules: Arc<dyn RuleEvaluator>,
    decisions: Arc<dyn SkillDecisionService>,
    model_name: String,
    timeout: Option<Duration>,
}

impl SkillFilter {
    /// Create a filter evaluating `model_name` on `decisions`.
    pub fn new(
        rules: Arc<dyn RuleEvaluator>,
        decisions: Arc<dyn SkillDecisionService>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            decisions,
            model_name: model_name.into(),
            timeout: None,
        }
    }

    /// Bound each collaborator call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Decision model consulted for qualified users.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The skill `task` requires, if any rule yields one.
    pub async fn requirement(&self, task: &Task) -> Option<String> {
        let inputs = task.rule_inputs();
        match bounded(self.timeout, self.rules.derive_requirement(&task.name, &inputs)).await {
            Ok(skill) => skill.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) => {
                warn!(task = %task.id, error = %e, "Rule evaluation failed, no skill constraint applied");
                None
            }
        }
    }

    /// Restrict `candidates` to the actors qualified for the task's skill.
    pub async fn narrow(&self, task: &Task, mut candidates: CandidateSet) -> CandidateSet {
        let Some(skill) = self.requirement(task).await else {
            debug!(task = %task.id, "No skill required");
            return candidates;
        };

        let qualified = match bounded(
            self.timeout,
            self.decisions.qualified_users(&self.model_name, &skill),
        )
        .await
        {
            Ok(qualified) => qualified,
            Err(e) => {
                warn!(
                    task = %task.id,
                    skill = %skill,
                    model = %self.model_name,
                    error = %e,
                    "Skill decision failed, keeping all candidates"
                );
                return candidates;
            }
        };

        candidates.retain(|actor| qualified.contains(actor));
        debug!(task = %task.id, skill = %skill, qualified = qualified.len(), %candidates, "Candidates narrowed by skill");
        candidates
    }
}
