//! Assignable entities and the assignment graph of a task.

use serde::{Deserialize, Serialize};
use crate::id::{ActorId, GroupId};

/// Something a task can be offered to.
///
/// Groups are only ever resolved to their members through the directory; a
/// group never compares equal to an individual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum AssignableEntity {
    /// A single actor
    Individual(ActorId),

    /// A named collection of actors
    Group(GroupId),
}

impl AssignableEntity {
    /// Shorthand for an individual entity.
    pub fn individual(id: impl Into<ActorId>) -> Self {
        Self::Individual(id.into())
    }

    /// Shorthand for a group entity.
    pub fn group(id: impl Into<GroupId>) -> Self {
        Self::Group(id.into())
    }

    /// Raw identifier, regardless of variant.
    pub fn id(&self) -> &str {
        match self {
            Self::Individual(a) => a.as_str(),
            Self::Group(g) => g.as_str(),
        }
    }
}

impl std::fmt::Display for AssignableEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Individual(a) => write!(f, "user:{}", a),
            Self::Group(g) => write!(f, "group:{}", g),
        }
    }
}

/// The assignment graph of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeopleAssignments {
    /// Who may own the task, in declaration order (duplicates permitted)
    #[serde(default)]
    pub potential_owners: Vec<AssignableEntity>,

    /// Who must never own the task
    #[serde(default)]
    pub excluded_owners: Vec<AssignableEntity>,
}

impl PeopleAssignments {
    /// Excluded groups, in declaration order.
    pub fn excluded_groups(&self) -> impl Iterator<Item = &GroupId> {
        self.excluded_owners.iter().filter_map(|e| match e {
            AssignableEntity::Group(g) => Some(g),
            AssignableEntity::Individual(_) => None,
        })
    }

    /// Whether `group` is itself listed among the excluded owners.
    pub fn is_group_excluded(&self, group: &GroupId) -> bool {
        self.excluded_groups().any(|g| g == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_json_shape() {
        let json = serde_json::to_value(AssignableEntity::group("dev-team")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "group", "id": "dev-team"}));

        let back: AssignableEntity =
            serde_json::from_value(serde_json::json!({"type": "individual", "id": "alice"})).unwrap();
        assert_eq!(back, AssignableEntity::individual("alice"));
    }

    #[test]
    fn test_individual_and_group_with_same_id_differ() {
        assert_ne!(AssignableEntity::individual("ops"), AssignableEntity::group("ops"));
    }

    #[test]
    fn test_is_group_excluded() {
        let people = PeopleAssignments {
            potential_owners: vec![AssignableEntity::group("ops")],
            excluded_owners: vec![
                AssignableEntity::individual("ops"),
                AssignableEntity::group("contractors"),
            ],
        };
        assert!(!people.is_group_excluded(&GroupId::from("ops")));
        assert!(people.is_group_excluded(&GroupId::from("contractors")));
    }
}
