//! Identifiers for Delegate entities.
//!
//! Actor, group and task identifiers are owned by external systems (the
//! directory and the workflow engine), so they are opaque strings here. Only
//! [`ResolutionId`] is minted by Delegate itself.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of an individual actor (a user that can own a task).
    ActorId
);

string_id!(
    /// Identifier of a group, resolved to its members by the directory.
    GroupId
);

string_id!(
    /// Identifier of a task, as issued by the workflow engine.
    TaskId
);

/// Unique identifier for one resolution run, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionId(Ulid);

impl ResolutionId {
    /// Generate a new ResolutionId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ResolutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ResolutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ResolutionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}
