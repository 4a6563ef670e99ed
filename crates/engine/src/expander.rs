//! Group expansion through the directory.

use std::sync::Arc;
use std::time::Duration;
use delegate_core::{ActorId, GroupId};
use delegate_services::Directory;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::lookup::bounded;

/// Turns groups into their member actors.
///
/// A group that cannot be resolved expands to nothing; it never fails the
/// resolution.
#[derive(Clone)]
pub struct GroupExpander {
    directory: Arc<dyn Directory>,
    timeout: Option<Duration>,
}

impl GroupExpander {
    /// Create an expander over `directory`.
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            directory,
            timeout: None,
        }
    }

    /// Bound each directory call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Members of `group`, in directory order.
    pub async fn expand(&self, group: &GroupId) -> Vec<ActorId> {
        match bounded(self.timeout, self.directory.members_of(group)).await {
            Ok(members) => {
                debug!(%group, members = members.len(), "Group expanded");
                members
            }
            Err(e) => {
                warn!(%group, error = %e, "Group expansion failed, treating as empty");
                Vec::new()
            }
        }
    }

    /// Expand several groups concurrently. The result is aligned with
    /// `groups`, whatever order the lookups complete in.
    pub async fn expand_all(&self, groups: &[&GroupId]) -> Vec<Vec<ActorId>> {
        join_all(groups.iter().map(|g| self.expand(g))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ids, MockDirectory};

    #[tokio::test]
    async fn test_expand_known_group() {
        let dir = MockDirectory::default().with_group("dev-team", &["alice", "bob"]);
        let expander = GroupExpander::new(Arc::new(dir));

        assert_eq!(expander.expand(&GroupId::from("dev-team")).await, ids(&["alice", "bob"]));
        assert!(expander.expand(&GroupId::from("ghosts")).await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_lookup_is_empty() {
        let dir = MockDirectory::default().with_failing_group("ops");
        let expander = GroupExpander::new(Arc::new(dir));

        assert!(expander.expand(&GroupId::from("ops")).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_empty_and_keeps_alignment() {
        let dir = MockDirectory::default()
            .with_slow_group("slow", &["zed"])
            .with_group("fast", &["amy"]);
        let expander = GroupExpander::new(Arc::new(dir)).with_timeout(Some(Duration::from_secs(1)));

        let slow = GroupId::from("slow");
        let fast = GroupId::from("fast");
        let expanded = expander.expand_all(&[&slow, &fast]).await;

        assert_eq!(expanded, vec![Vec::new(), ids(&["amy"])]);
    }
}
