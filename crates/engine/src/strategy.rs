//! The assignment strategy: resolve, narrow, balance, decide.

use std::collections::BTreeMap;
use std::sync::Arc;
use async_trait::async_trait;
use delegate_core::{ActorId, Assignment, CandidateSet, DecisionPath, ResolutionId, Task};
use delegate_services::{Directory, LoadMetricRegistry, RuleEvaluator, SkillDecisionService};
use tracing::{debug, info, Instrument};

use crate::config::ResolvedConfig;
use crate::error::{AssignmentError, ConfigError};
use crate::expander::GroupExpander;
use crate::resolver::CandidateResolver;
use crate::skills::SkillFilter;
use crate::workload::WorkloadSelector;

/// Identifier of [`DelegateStrategy`].
pub const DELEGATE_STRATEGY: &str = "Custom";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Building the candidate set from the assignment graph
    Resolving,
    /// Narrowing by skill
    SkillNarrowing,
    /// Picking the least loaded candidate
    WorkloadSelecting,
    /// Final decision
    Finalized,
}

impl Stage {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolving => "resolving",
            Stage::SkillNarrowing => "skill narrowing",
            Stage::WorkloadSelecting => "workload selecting",
            Stage::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy deciding who owns a task.
#[async_trait]
pub trait AssignmentStrategy: Send + Sync {
    /// Identifier the calling engine selects this strategy by.
    fn identifier(&self) -> &str;

    /// Choose an owner for `task`, never picking `excluded_actor`.
    async fn apply(&self, task: &Task, excluded_actor: Option<&ActorId>) -> Result<Assignment, AssignmentError>;
}

/// External collaborators needed to build a [`DelegateStrategy`].
#[derive(Clone)]
pub struct Collaborators {
    /// Group directory
    pub directory: Arc<dyn Directory>,
    /// Skill rules; required when skills matching is configured
    pub rules: Option<Arc<dyn RuleEvaluator>>,
    /// Skill decisions; required when skills matching is configured
    pub decisions: Option<Arc<dyn SkillDecisionService>>,
}

impl Collaborators {
    /// Collaborators with only a directory.
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            directory,
            rules: None,
            decisions: None,
        }
    }

    /// Set the skill backends.
    pub fn with_skills(
        mut self,
        rules: Arc<dyn RuleEvaluator>,
        decisions: Arc<dyn SkillDecisionService>,
    ) -> Self {
        self.rules = Some(rules);
        self.decisions = Some(decisions);
        self
    }
}

/// The built-in strategy.
///
/// Runs `Resolving → SkillNarrowing → WorkloadSelecting → Finalized` strictly
/// in order. An empty candidate set after resolving or skill narrowing ends
/// the run with [`AssignmentError::NoEligibleCandidate`].
#[derive(Clone)]
pub struct DelegateStrategy {
    resolver: CandidateResolver,
    skills: Option<SkillFilter>,
    workload: WorkloadSelector,
    workload_enabled: bool,
}

impl DelegateStrategy {
    /// Build from validated configuration.
    ///
    /// The load metric is resolved from `metrics` here, once.
    pub fn new(
        config: &ResolvedConfig,
        collaborators: Collaborators,
        metrics: &LoadMetricRegistry,
    ) -> Result<Self, ConfigError> {
        let timeout = config.lookup_timeout;

        let metric = metrics
            .create(&config.calculator)
            .ok_or_else(|| ConfigError::UnknownCalculator {
                name: config.calculator.clone(),
                known: metrics.identifiers().join(", "),
            })?;

        let skills = match &config.skills {
            Some(settings) => {
                let rules = collaborators
                    .rules
                    .ok_or(ConfigError::MissingService("rule evaluator"))?;
                let decisions = collaborators
                    .decisions
                    .ok_or(ConfigError::MissingService("skill decision service"))?;
                Some(SkillFilter::new(rules, decisions, settings.model_name.clone()).with_timeout(timeout))
            }
            None => None,
        };

        debug!(
            skills = skills.is_some(),
            workload = config.workload_enabled,
            calculator = %config.calculator,
            "Assignment strategy configured"
        );

        Ok(Self {
            resolver: CandidateResolver::new(
                GroupExpander::new(collaborators.directory).with_timeout(timeout),
            ),
            skills,
            workload: WorkloadSelector::new(metric).with_timeout(timeout),
            workload_enabled: config.workload_enabled,
        })
    }

    /// Assemble from already-built stages.
    pub fn from_stages(
        resolver: CandidateResolver,
        skills: Option<SkillFilter>,
        workload: WorkloadSelector,
        workload_enabled: bool,
    ) -> Self {
        Self {
            resolver,
            skills,
            workload,
            workload_enabled,
        }
    }

    /// Whether the skill stage runs.
    pub fn skills_feature_active(&self) -> bool {
        self.skills.is_some()
    }

    /// Whether workload balancing applies to `task`: the task's own
    /// override when it has one, the deployment default otherwise.
    pub fn workload_active_for(&self, task: &Task) -> bool {
        task.workload_override().unwrap_or(self.workload_enabled)
    }

    /// Candidates after resolving and skill narrowing, without deciding.
    pub async fn candidates(&self, task: &Task, excluded_actor: Option<&ActorId>) -> CandidateSet {
        let candidates = self.resolver.resolve(task, excluded_actor).await;
        match &self.skills {
            Some(filter) if !candidates.is_empty() => filter.narrow(task, candidates).await,
            _ => candidates,
        }
    }

    async fn run(
        &self,
        task: &Task,
        excluded_actor: Option<&ActorId>,
        resolution: ResolutionId,
    ) -> Result<Assignment, AssignmentError> {
        let no_candidate = |stage| AssignmentError::NoEligibleCandidate {
            task: task.id.clone(),
            stage,
        };

        debug!(stage = %Stage::Resolving, "Stage started");
        let mut candidates = self.resolver.resolve(task, excluded_actor).await;
        if candidates.is_empty() {
            info!(stage = %Stage::Resolving, "No eligible candidate");
            return Err(no_candidate(Stage::Resolving));
        }

        if let Some(filter) = &self.skills {
            debug!(stage = %Stage::SkillNarrowing, "Stage started");
            candidates = filter.narrow(task, candidates).await;
            if candidates.is_empty() {
                info!(stage = %Stage::SkillNarrowing, "No eligible candidate");
                return Err(no_candidate(Stage::SkillNarrowing));
            }
        }

        let mut selected = None;
        if self.workload_active_for(task) {
            debug!(stage = %Stage::WorkloadSelecting, metric = self.workload.metric_identifier(), "Stage started");
            selected = self.workload.select_least_loaded(&candidates, task).await;
        }

        debug!(stage = %Stage::Finalized, "Stage started");
        let (actor, path) = match selected {
            Some(actor) => (actor, DecisionPath::Workload),
            None => match candidates.first() {
                Some(first) => (first.clone(), DecisionPath::Fallback),
                None => return Err(no_candidate(Stage::Finalized)),
            },
        };

        info!(actor = %actor, decided_by = path.as_str(), "Task assigned");
        Ok(Assignment::new(actor, task.id.clone(), DELEGATE_STRATEGY, path, resolution))
    }
}

#[async_trait]
impl AssignmentStrategy for DelegateStrategy {
    fn identifier(&self) -> &str {
        DELEGATE_STRATEGY
    }

    async fn apply(&self, task: &Task, excluded_actor: Option<&ActorId>) -> Result<Assignment, AssignmentError> {
        let resolution = ResolutionId::new();
        let span = tracing::info_span!("assign", task = %task.id, %resolution);
        self.run(task, excluded_actor, resolution).instrument(span).await
    }
}

/// Strategies keyed by identifier.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn AssignmentStrategy>>,
}

impl StrategyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy under its own identifier.
    pub fn register(&mut self, strategy: Arc<dyn AssignmentStrategy>) {
        self.strategies
            .insert(strategy.identifier().to_string(), strategy);
    }

    /// Look up a strategy.
    pub fn get(&self, identifier: &str) -> Option<Arc<dyn AssignmentStrategy>> {
        self.strategies.get(identifier).cloned()
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }
}
