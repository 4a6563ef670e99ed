//! HTTP clients for remotely deployed rule and decision containers.
//!
//! Both clients talk to an execution server that hosts one container per
//! deployed release:
//!
//! - rules: `POST {base}/containers/instances/{container}` with a command batch
//! - decisions: `POST {base}/containers/{container}/dmn`
//! - scanning: `POST {base}/containers/{container}/scanner`

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use async_trait::async_trait;
use delegate_core::ActorId;
use reqwest::{Client, ClientBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::trait_::{Refreshable, Result, RuleEvaluator, ServiceError, SkillDecisionService};

/// Decision input carrying the skill.
pub const SKILL_INPUT: &str = "Skill Input";

/// Decision whose result lists the qualified users.
pub const USERS_BY_SKILL_DECISION: &str = "Get Users by Skill";

const OUT_IDENTIFIER: &str = "skills";

fn build_client(timeout: Duration) -> Client {
    ClientBuilder::new()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ServiceError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Unavailable(format!(
            "{} returned {}: {}",
            what, status, body
        )));
    }
    Ok(response)
}

async fn trigger_scan(client: &Client, base_url: &str, container: &str) -> Result<()> {
    let response = client
        .post(format!("{}/containers/{}/scanner", base_url, container))
        .json(&json!({ "status": "SCANNING" }))
        .send()
        .await?;
    ensure_success(response, container).await?;
    debug!(container, "Scan triggered");
    Ok(())
}

#[derive(Deserialize)]
struct ServiceResponse<T> {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    msg: Option<String>,
    result: Option<T>,
}

impl<T> ServiceResponse<T> {
    fn into_result(self, what: &str) -> Result<T> {
        if self.kind != "SUCCESS" {
            return Err(ServiceError::Unavailable(format!(
                "{}: {}",
                what,
                self.msg.unwrap_or(self.kind)
            )));
        }
        self.result
            .ok_or_else(|| ServiceError::Other(format!("{}: empty result", what)))
    }
}

/// Client for a remote decision container.
#[derive(Clone)]
pub struct HttpDecisionClient {
    client: Client,
    base_url: String,
    container: String,
}

impl HttpDecisionClient {
    /// Create a client for `container` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            client: build_client(Duration::from_secs(30)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            container: container.into(),
        }
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }
}

#[derive(Deserialize)]
struct DmnResult {
    #[serde(rename = "dmn-evaluation-result")]
    evaluation: DmnEvaluation,
}

#[derive(Deserialize)]
struct DmnEvaluation {
    #[serde(rename = "decision-results", default)]
    decision_results: BTreeMap<String, DecisionResult>,
}

#[derive(Deserialize)]
struct DecisionResult {
    #[serde(rename = "decision-name")]
    name: String,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    status: Option<String>,
}

#[async_trait]
impl SkillDecisionService for HttpDecisionClient {
    async fn qualified_users(&self, model: &str, skill: &str) -> Result<HashSet<ActorId>> {
        let payload = json!({
            "model-name": model,
            "dmn-context": { SKILL_INPUT: skill },
        });

        debug!(model, skill, container = %self.container, "Evaluating skill decision");

        let response = self
            .client
            .post(format!("{}/containers/{}/dmn", self.base_url, self.container))
            .json(&payload)
            .send()
            .await?;
        let response = ensure_success(response, &self.container).await?;
        let body: ServiceResponse<DmnResult> = response.json().await?;
        let result = body.into_result(model)?;

        let decision = result
            .evaluation
            .decision_results
            .into_values()
            .find(|d| d.name == USERS_BY_SKILL_DECISION)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("decision '{}' in {}", USERS_BY_SKILL_DECISION, model))
            })?;

        if let Some(status) = decision.status.as_deref() {
            if status != "SUCCEEDED" {
                return Err(ServiceError::Unavailable(format!(
                    "decision '{}' {}",
                    USERS_BY_SKILL_DECISION, status
                )));
            }
        }

        match decision.result {
            serde_json::Value::Null => Ok(HashSet::new()),
            value => {
                let users: Vec<String> = serde_json::from_value(value)?;
                Ok(users.into_iter().map(ActorId::from).collect())
            }
        }
    }
}

#[async_trait]
impl Refreshable for HttpDecisionClient {
    fn label(&self) -> &str {
        &self.container
    }

    async fn refresh(&self) -> Result<()> {
        trigger_scan(&self.client, &self.base_url, &self.container).await
    }
}

/// Client for a remote rule container.
///
/// Inserts the task inputs, fires all rules and reads back the string facts;
/// the first one is the derived skill.
#[derive(Clone)]
pub struct HttpRuleClient {
    client: Client,
    base_url: String,
    container: String,
}

impl HttpRuleClient {
    /// Create a client for `container` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            client: build_client(Duration::from_secs(30)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            container: container.into(),
        }
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }
}

#[derive(Deserialize)]
struct BatchResult {
    #[serde(rename = "execution-results")]
    execution: ExecutionResults,
}

#[derive(Deserialize)]
struct ExecutionResults {
    #[serde(default)]
    results: Vec<NamedResult>,
}

#[derive(Deserialize)]
struct NamedResult {
    key: String,
    value: serde_json::Value,
}

#[async_trait]
impl RuleEvaluator for HttpRuleClient {
    async fn derive_requirement(
        &self,
        task_name: &str,
        inputs: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Option<String>> {
        let payload = json!({
            "commands": [
                { "insert": { "object": inputs } },
                { "fire-all-rules": {} },
                { "get-objects": { "out-identifier": OUT_IDENTIFIER, "class-object-filter": "string" } },
            ]
        });

        debug!(task_name, container = %self.container, "Evaluating skill rules");

        let response = self
            .client
            .post(format!("{}/containers/instances/{}", self.base_url, self.container))
            .json(&payload)
            .send()
            .await?;
        let response = ensure_success(response, &self.container).await?;
        let body: ServiceResponse<BatchResult> = response.json().await?;
        let result = body.into_result(&self.container)?;

        let facts = result
            .execution
            .results
            .into_iter()
            .find(|r| r.key == OUT_IDENTIFIER)
            .map(|r| r.value);

        let skills: Vec<String> = match facts {
            None | Some(serde_json::Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value)?,
        };

        if skills.len() > 1 {
            warn!(task_name, ?skills, "Several skills derived, using the first");
        }
        Ok(skills.into_iter().next())
    }
}

#[async_trait]
impl Refreshable for HttpRuleClient {
    fn label(&self) -> &str {
        &self.container
    }

    async fn refresh(&self) -> Result<()> {
        trigger_scan(&self.client, &self.base_url, &self.container).await
    }
}
