//! Mock collaborators shared by the unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use delegate_core::{ActorId, GroupId, LoadMeasure, Task};
use delegate_services::{
    Directory, LoadMetric, Result, RuleEvaluator, ServiceError, SkillDecisionService,
};

pub(crate) fn ids(values: &[&str]) -> Vec<ActorId> {
    values.iter().map(|v| ActorId::from(*v)).collect()
}

/// Directory with per-group failures and a call counter.
#[derive(Default)]
pub(crate) struct MockDirectory {
    groups: HashMap<GroupId, Vec<ActorId>>,
    failing: HashSet<GroupId>,
    slow: HashSet<GroupId>,
    pub(crate) calls: AtomicUsize,
}

impl MockDirectory {
    pub(crate) fn with_group(mut self, group: &str, members: &[&str]) -> Self {
        self.groups.insert(GroupId::from(group), ids(members));
        self
    }

    pub(crate) fn with_failing_group(mut self, group: &str) -> Self {
        self.failing.insert(GroupId::from(group));
        self
    }

    pub(crate) fn with_slow_group(mut self, group: &str, members: &[&str]) -> Self {
        self.slow.insert(GroupId::from(group));
        self.with_group(group, members)
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for MockDirectory {
    async fn members_of(&self, group: &GroupId) -> Result<Vec<ActorId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(group) {
            return Err(ServiceError::Unavailable(format!("directory down for {}", group)));
        }
        if self.slow.contains(group) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        Ok(self.groups.get(group).cloned().unwrap_or_default())
    }
}

/// Rule evaluator returning a fixed answer.
pub(crate) struct MockRules {
    answer: std::result::Result<Option<String>, String>,
    pub(crate) seen: std::sync::Mutex<Option<BTreeMap<String, serde_json::Value>>>,
    pub(crate) calls: AtomicUsize,
}

impl MockRules {
    pub(crate) fn skill(skill: &str) -> Self {
        Self::with_answer(Ok(Some(skill.to_string())))
    }

    pub(crate) fn none() -> Self {
        Self::with_answer(Ok(None))
    }

    pub(crate) fn failing() -> Self {
        Self::with_answer(Err("rule engine down".to_string()))
    }

    fn with_answer(answer: std::result::Result<Option<String>, String>) -> Self {
        Self {
            answer,
            seen: std::sync::Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleEvaluator for MockRules {
    async fn derive_requirement(
        &self,
        _task_name: &str,
        inputs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            *seen = Some(inputs.clone());
        }
        self.answer.clone().map_err(ServiceError::Unavailable)
    }
}

/// Decision service returning a fixed set, or failing.
pub(crate) struct MockDecisions {
    answer: Option<HashSet<ActorId>>,
    pub(crate) calls: AtomicUsize,
}

impl MockDecisions {
    pub(crate) fn qualified(users: &[&str]) -> Self {
        Self {
            answer: Some(ids(users).into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SkillDecisionService for MockDecisions {
    async fn qualified_users(&self, model: &str, _skill: &str) -> Result<HashSet<ActorId>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .ok_or_else(|| ServiceError::NotFound(format!("decision model {}", model)))
    }
}

/// Load metric backed by a fixed table.
pub(crate) struct MockLoads {
    loads: Option<Vec<(ActorId, f64)>>,
    pub(crate) calls: AtomicUsize,
}

impl MockLoads {
    pub(crate) fn table(loads: &[(&str, f64)]) -> Self {
        Self {
            loads: Some(loads.iter().map(|(a, l)| (ActorId::from(*a), *l)).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            loads: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoadMetric for MockLoads {
    fn identifier(&self) -> &str {
        "mock"
    }

    async fn load_of(&self, actors: &[ActorId], _task: &Task) -> Result<Vec<LoadMeasure>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let table = self
            .loads
            .as_ref()
            .ok_or_else(|| ServiceError::Unavailable("metrics store down".to_string()))?;
        Ok(table
            .iter()
            .filter(|(a, _)| actors.contains(a))
            .map(|(a, l)| LoadMeasure::new(a.clone(), *l, *l as u64))
            .collect())
    }
}
