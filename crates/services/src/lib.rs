//! External collaborators of the assignment engine.
//!
//! This crate provides the trait boundaries (directory, rule evaluation,
//! skill decisions, load metrics) together with in-memory and HTTP backends.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod http;
pub mod load;

pub use trait_::{
    Directory, LoadMetric, Refreshable, Result, RuleEvaluator, ServiceError, SkillDecisionService,
};
pub use memory::{
    InMemoryDirectory, InMemoryOpenTasks, InMemorySkillMatrix, ServiceFixtures, SkillRule,
    StaticRuleEvaluator, DEFAULT_SKILL_MODEL,
};
pub use http::{HttpDecisionClient, HttpRuleClient};
pub use load::{
    LoadMetricRegistry, NoDataLoadMetric, OpenTaskSource, TaskCountLoadMetric, NO_DATA_METRIC,
    TASK_COUNT_METRIC,
};
