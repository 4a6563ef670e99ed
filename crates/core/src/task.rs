//! Task model - the unit of work waiting for an owner.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::entity::{AssignableEntity, PeopleAssignments};
use crate::id::TaskId;

/// Input variable carrying the per-task workload override.
pub const WORKLOAD_OVERRIDE_VARIABLE: &str = "workloadStrategyActivated";

/// Entry added to the rule inputs carrying the task name.
pub const TASK_NAME_VARIABLE: &str = "taskName";

/// A task awaiting assignment.
///
/// Tasks are created and owned by the workflow engine; Delegate only reads
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Task name (the node name in the process definition)
    pub name: String,

    /// Input variables
    #[serde(default)]
    pub input_variables: BTreeMap<String, serde_json::Value>,

    /// Assignment graph
    #[serde(default)]
    pub people: PeopleAssignments,
}

impl Task {
    /// Create a task with an empty assignment graph.
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input_variables: BTreeMap::new(),
            people: PeopleAssignments::default(),
        }
    }

    /// Add a potential owner.
    pub fn with_potential_owner(mut self, entity: AssignableEntity) -> Self {
        self.people.potential_owners.push(entity);
        self
    }

    /// Add an excluded owner.
    pub fn with_excluded_owner(mut self, entity: AssignableEntity) -> Self {
        self.people.excluded_owners.push(entity);
        self
    }

    /// Set an input variable.
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.input_variables.insert(key.into(), value.into());
        self
    }

    /// Read a string input variable. Non-string values yield `None`.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input_variables.get(key).and_then(|v| v.as_str())
    }

    /// Input variables as handed to rule evaluation: a copy of the task
    /// inputs with the task name added under [`TASK_NAME_VARIABLE`].
    pub fn rule_inputs(&self) -> BTreeMap<String, serde_json::Value> {
        let mut inputs = self.input_variables.clone();
        inputs.insert(
            TASK_NAME_VARIABLE.to_string(),
            serde_json::Value::String(self.name.clone()),
        );
        inputs
    }

    /// Per-task workload override.
    ///
    /// `None` when the variable is absent, empty, or not a boolean.
    pub fn workload_override(&self) -> Option<bool> {
        match self.input_variables.get(WORKLOAD_OVERRIDE_VARIABLE)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("false") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_inputs_adds_task_name_without_touching_task() {
        let task = Task::new("t-1", "Approve invoice").with_input("amount", 1200);
        let inputs = task.rule_inputs();

        assert_eq!(inputs["taskName"], "Approve invoice");
        assert_eq!(inputs["amount"], 1200);
        assert!(!task.input_variables.contains_key("taskName"));
    }

    #[test]
    fn test_workload_override_parsing() {
        let base = Task::new("t-1", "Review");
        assert_eq!(base.workload_override(), None);
        assert_eq!(base.clone().with_input(WORKLOAD_OVERRIDE_VARIABLE, "true").workload_override(), Some(true));
        assert_eq!(base.clone().with_input(WORKLOAD_OVERRIDE_VARIABLE, "FALSE").workload_override(), Some(false));
        assert_eq!(base.clone().with_input(WORKLOAD_OVERRIDE_VARIABLE, "").workload_override(), None);
        assert_eq!(base.clone().with_input(WORKLOAD_OVERRIDE_VARIABLE, "yes").workload_override(), None);
        assert_eq!(base.with_input(WORKLOAD_OVERRIDE_VARIABLE, false).workload_override(), Some(false));
    }

    #[test]
    fn test_task_deserializes_with_defaults() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "t-9",
            "name": "Inspect weld",
            "people": {
                "potential_owners": [{"type": "group", "id": "welders"}]
            }
        }))
        .unwrap();

        assert!(task.input_variables.is_empty());
        assert!(task.people.excluded_owners.is_empty());
        assert_eq!(task.people.potential_owners, vec![AssignableEntity::group("welders")]);
    }
}
