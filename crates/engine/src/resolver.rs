//! Candidate resolution: from the assignment graph to eligible actors.

use delegate_core::{ActorId, AssignableEntity, CandidateSet, ExcludedSet, GroupId, Task};
use tracing::debug;

use crate::expander::GroupExpander;

/// Computes the eligible candidates of a task.
#[derive(Clone)]
pub struct CandidateResolver {
    expander: GroupExpander,
}

impl CandidateResolver {
    /// Create a resolver expanding groups with `expander`.
    pub fn new(expander: GroupExpander) -> Self {
        Self { expander }
    }

    /// Everyone who must not receive the task: excluded individuals, members
    /// of excluded groups, and `excluded_actor`.
    pub async fn excluded_set(&self, task: &Task, excluded_actor: Option<&ActorId>) -> ExcludedSet {
        let mut individuals = Vec::new();
        let mut groups: Vec<&GroupId> = Vec::new();
        for entity in &task.people.excluded_owners {
            match entity {
                AssignableEntity::Individual(actor) => individuals.push(actor.clone()),
                AssignableEntity::Group(group) => {
                    if !groups.contains(&group) {
                        groups.push(group);
                    }
                }
            }
        }

        let members = self.expander.expand_all(&groups).await;

        individuals
            .into_iter()
            .chain(members.into_iter().flatten())
            .chain(excluded_actor.cloned())
            .collect()
    }

    /// Eligible candidates, in order of first appearance.
    ///
    /// Direct individuals come first, in declaration order, followed by the
    /// members of each potential-owner group in declaration order. Groups
    /// that are themselves excluded contribute nobody.
    pub async fn resolve(&self, task: &Task, excluded_actor: Option<&ActorId>) -> CandidateSet {
        let excluded = self.excluded_set(task, excluded_actor).await;

        let mut candidates = CandidateSet::new();
        let mut groups: Vec<&GroupId> = Vec::new();

        for entity in &task.people.potential_owners {
            match entity {
                AssignableEntity::Individual(actor) => {
                    if !excluded.contains(actor) {
                        candidates.push_unique(actor.clone());
                    }
                }
                AssignableEntity::Group(group) => {
                    if !task.people.is_group_excluded(group) && !groups.contains(&group) {
                        groups.push(group);
                    }
                }
            }
        }

        for members in self.expander.expand_all(&groups).await {
            for member in members {
                if !excluded.contains(&member) {
                    candidates.push_unique(member);
                }
            }
        }

        debug!(
            task = %task.id,
            excluded = excluded.len(),
            groups = groups.len(),
            %candidates,
            "Candidates resolved"
        );
        candidates
    }
}
