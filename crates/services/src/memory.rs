//! In-memory collaborator backends.
//!
//! These back the CLI and tests. They can be built in code or loaded from a
//! JSON fixtures file:
//!
//! ```json
//! {
//!   "groups": { "dev-team": ["alice", "bob"] },
//!   "rules": [ { "task_name": "Weld seam", "skill": "welding" } ],
//!   "skill_model": "SkillUsers",
//!   "skills": { "welding": ["carol"] },
//!   "open_tasks": { "alice": 3, "bob": 1 }
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use async_trait::async_trait;
use delegate_core::{ActorId, GroupId};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::load::OpenTaskSource;
use crate::trait_::{Directory, Result, RuleEvaluator, ServiceError, SkillDecisionService};

/// Default decision model name.
pub const DEFAULT_SKILL_MODEL: &str = "SkillUsers";

/// Directory backed by a static group table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    groups: HashMap<GroupId, Vec<ActorId>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group with its members.
    pub fn with_group<I, A>(mut self, group: impl Into<GroupId>, members: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ActorId>,
    {
        self.groups
            .insert(group.into(), members.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn members_of(&self, group: &GroupId) -> Result<Vec<ActorId>> {
        Ok(self.groups.get(group).cloned().unwrap_or_default())
    }
}

/// One row of a static rule table.
///
/// A rule matches when `task_name` (if set) equals the task name and every
/// entry of `when` equals the corresponding input variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRule {
    /// Task name the rule applies to; any task when absent
    #[serde(default)]
    pub task_name: Option<String>,

    /// Required input values
    #[serde(default)]
    pub when: BTreeMap<String, serde_json::Value>,

    /// Skill produced when the rule matches
    pub skill: String,
}

impl SkillRule {
    fn matches(&self, task_name: &str, inputs: &BTreeMap<String, serde_json::Value>) -> bool {
        if self.task_name.as_deref().is_some_and(|n| n != task_name) {
            return false;
        }
        self.when
            .iter()
            .all(|(key, expected)| inputs.get(key) == Some(expected))
    }
}

/// Rule evaluator over an ordered rule table. The first matching rule wins.
#[derive(Debug, Clone, Default)]
pub struct StaticRuleEvaluator {
    rules: Vec<SkillRule>,
}

impl StaticRuleEvaluator {
    /// Create from a rule table.
    pub fn new(rules: Vec<SkillRule>) -> Self {
        Self { rules }
    }

    /// Append a rule matching a task name.
    pub fn with_task_rule(mut self, task_name: impl Into<String>, skill: impl Into<String>) -> Self {
        self.rules.push(SkillRule {
            task_name: Some(task_name.into()),
            when: BTreeMap::new(),
            skill: skill.into(),
        });
        self
    }
}

#[async_trait]
impl RuleEvaluator for StaticRuleEvaluator {
    async fn derive_requirement(
        &self,
        task_name: &str,
        inputs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Option<String>> {
        let skill = self
            .rules
            .iter()
            .find(|r| r.matches(task_name, inputs))
            .map(|r| r.skill.clone());
        debug!(task_name, ?skill, "Static rule table evaluated");
        Ok(skill)
    }
}

/// Skill matrix for a single decision model.
#[derive(Debug, Clone)]
pub struct InMemorySkillMatrix {
    model: String,
    skills: HashMap<String, HashSet<ActorId>>,
}

impl InMemorySkillMatrix {
    /// Create an empty matrix for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            skills: HashMap::new(),
        }
    }

    /// Record which actors hold `skill`.
    pub fn with_skill<I, A>(mut self, skill: impl Into<String>, actors: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ActorId>,
    {
        self.skills
            .entry(skill.into())
            .or_default()
            .extend(actors.into_iter().map(Into::into));
        self
    }
}

impl Default for InMemorySkillMatrix {
    fn default() -> Self {
        Self::new(DEFAULT_SKILL_MODEL)
    }
}

#[async_trait]
impl SkillDecisionService for InMemorySkillMatrix {
    async fn qualified_users(&self, model: &str, skill: &str) -> Result<HashSet<ActorId>> {
        if model != self.model {
            return Err(ServiceError::NotFound(format!("decision model {}", model)));
        }
        Ok(self.skills.get(skill).cloned().unwrap_or_default())
    }
}

/// Open task counts held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOpenTasks {
    counts: HashMap<ActorId, u64>,
}

impl InMemoryOpenTasks {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open task count of `actor`.
    pub fn with_count(mut self, actor: impl Into<ActorId>, count: u64) -> Self {
        self.counts.insert(actor.into(), count);
        self
    }
}

#[async_trait]
impl OpenTaskSource for InMemoryOpenTasks {
    async fn open_task_counts(&self, actors: &[ActorId]) -> Result<HashMap<ActorId, u64>> {
        Ok(actors
            .iter()
            .filter_map(|a| self.counts.get(a).map(|c| (a.clone(), *c)))
            .collect())
    }
}

/// All in-memory backends, as loaded from a fixtures file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceFixtures {
    /// Group id -> members
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,

    /// Rule table
    #[serde(default)]
    pub rules: Vec<SkillRule>,

    /// Decision model served by the skill matrix
    #[serde(default)]
    pub skill_model: Option<String>,

    /// Skill -> qualified actors
    #[serde(default)]
    pub skills: BTreeMap<String, Vec<String>>,

    /// Actor -> open task count
    #[serde(default)]
    pub open_tasks: BTreeMap<String, u64>,
}

impl ServiceFixtures {
    /// Load fixtures from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Build the directory.
    pub fn directory(&self) -> InMemoryDirectory {
        self.groups
            .iter()
            .fold(InMemoryDirectory::new(), |dir, (group, members)| {
                dir.with_group(group.as_str(), members.iter().map(String::as_str))
            })
    }

    /// Build the rule evaluator.
    pub fn rule_evaluator(&self) -> StaticRuleEvaluator {
        StaticRuleEvaluator::new(self.rules.clone())
    }

    /// Build the skill matrix.
    pub fn skill_matrix(&self) -> InMemorySkillMatrix {
        let model = self.skill_model.as_deref().unwrap_or(DEFAULT_SKILL_MODEL);
        self.skills
            .iter()
            .fold(InMemorySkillMatrix::new(model), |matrix, (skill, actors)| {
                matrix.with_skill(skill.as_str(), actors.iter().map(String::as_str))
            })
    }

    /// Build the open task table.
    pub fn open_tasks(&self) -> InMemoryOpenTasks {
        self.open_tasks
            .iter()
            .fold(InMemoryOpenTasks::new(), |table, (actor, count)| {
                table.with_count(actor.as_str(), *count)
            })
    }
}
