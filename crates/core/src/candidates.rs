//! Candidate and exclusion sets built during a resolution.

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::id::ActorId;

/// Actors that must never receive the task.
///
/// Built once per resolution and frozen afterwards: there is no way to add
/// to an `ExcludedSet` after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludedSet(HashSet<ActorId>);

impl ExcludedSet {
    /// Whether `actor` is excluded.
    pub fn contains(&self, actor: &ActorId) -> bool {
        self.0.contains(actor)
    }

    /// Number of excluded actors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over excluded actors (unordered).
    pub fn iter(&self) -> impl Iterator<Item = &ActorId> {
        self.0.iter()
    }
}

impl FromIterator<ActorId> for ExcludedSet {
    fn from_iter<I: IntoIterator<Item = ActorId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Ordered, duplicate-free list of eligible actors.
///
/// Order is the order of first appearance; the first element is the
/// deterministic fallback assignee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateSet(Vec<ActorId>);

impl CandidateSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `actor` unless already present. Returns whether it was added.
    pub fn push_unique(&mut self, actor: ActorId) -> bool {
        if self.0.contains(&actor) {
            return false;
        }
        self.0.push(actor);
        true
    }

    /// Whether `actor` is a candidate.
    pub fn contains(&self, actor: &ActorId) -> bool {
        self.0.contains(actor)
    }

    /// Keep only the candidates matching `keep`, preserving order.
    pub fn retain(&mut self, keep: impl FnMut(&ActorId) -> bool) {
        self.0.retain(keep);
    }

    /// First candidate in declaration order.
    pub fn first(&self) -> Option<&ActorId> {
        self.0.first()
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in order.
    pub fn iter(&self) -> std::slice::Iter<'_, ActorId> {
        self.0.iter()
    }

    /// Borrow as a slice.
    pub fn as_slice(&self) -> &[ActorId] {
        &self.0
    }
}

impl FromIterator<ActorId> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = ActorId>>(iter: I) -> Self {
        let mut set = Self::new();
        for actor in iter {
            set.push_unique(actor);
        }
        set
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a ActorId;
    type IntoIter = std::slice::Iter<'a, ActorId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for CandidateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, actor) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", actor)?;
        }
        write!(f, "]")
    }
}
