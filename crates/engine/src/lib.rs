//! Assignment engine - candidate resolution, skill narrowing and workload
//! balancing behind a single strategy.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod expander;
pub mod resolver;
pub mod skills;
pub mod workload;
pub mod strategy;
pub mod scanner;

mod lookup;

#[cfg(test)]
mod test_support;

pub use config::{
    ReleaseConfig, ReleaseId, ReleaseSettings, ResolvedConfig, SkillSettings, SkillsConfig,
    StrategyConfig, WorkloadConfig,
};
pub use error::{AssignmentError, ConfigError};
pub use expander::GroupExpander;
pub use resolver::CandidateResolver;
pub use skills::SkillFilter;
pub use workload::WorkloadSelector;
pub use strategy::{
    AssignmentStrategy, Collaborators, DelegateStrategy, Stage, StrategyRegistry, DELEGATE_STRATEGY,
};
pub use scanner::{ReleaseScanner, ScannerHandle};
