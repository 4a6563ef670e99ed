//! Strategy configuration.
//!
//! Configuration is read once, from a TOML file and/or a flat property map,
//! and validated into a [`ResolvedConfig`] before the strategy is built.
//!
//! ```toml
//! assignment_enabled = true
//! lookup_timeout_ms = 2000
//!
//! [rules]
//! release_id = "com.acme:assignment-rules:1.0.0"
//! scanner_interval_ms = 60000
//!
//! [skills]
//! release_id = "com.acme:skills-matrix:1.0.0"
//! model_name = "SkillUsers"
//!
//! [workload]
//! enabled = true
//! calculator = "task-count"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use delegate_services::{DEFAULT_SKILL_MODEL, TASK_COUNT_METRIC};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Whether the calling engine should invoke assignment at all.
pub const KEY_ASSIGNMENT_ENABLED: &str = "delegate.assignment.enabled";
/// Per-call timeout for collaborator lookups, in milliseconds.
pub const KEY_LOOKUP_TIMEOUT: &str = "delegate.lookup.timeout";
/// Release coordinates of the skill rules.
pub const KEY_RULES_RELEASE: &str = "delegate.rules.releaseid";
/// Rule scanner polling interval, in milliseconds.
pub const KEY_RULES_SCANNER: &str = "delegate.rules.scannerinterval";
/// Rule server base URL.
pub const KEY_RULES_ENDPOINT: &str = "delegate.rules.endpoint";
/// Release coordinates of the skill decision model. Enables skills matching.
pub const KEY_SKILLS_RELEASE: &str = "delegate.skills.releaseid";
/// Decision scanner polling interval, in milliseconds.
pub const KEY_SKILLS_SCANNER: &str = "delegate.skills.scannerinterval";
/// Decision server base URL.
pub const KEY_SKILLS_ENDPOINT: &str = "delegate.skills.endpoint";
/// Decision model name.
pub const KEY_SKILLS_MODEL: &str = "delegate.skills.model.name";
/// Deployment-wide workload balancing flag.
pub const KEY_WORKLOAD_ENABLED: &str = "delegate.filters.workload";
/// Load metric identifier.
pub const KEY_WORKLOAD_CALCULATOR: &str = "delegate.filters.workload.calculator";

/// jBPM system properties accepted in place of the `delegate.*` keys.
pub const JBPM_KEYS: &[(&str, &str)] = &[
    (KEY_ASSIGNMENT_ENABLED, "org.jbpm.task.assignment.enabled"),
    (KEY_RULES_RELEASE, "usertasks.assignment.strategy.custom.drools.releaseid"),
    (KEY_RULES_SCANNER, "usertasks.assignment.strategy.custom.drools.scannerinterval"),
    (KEY_SKILLS_RELEASE, "usertasks.assignment.strategy.custom.dmn.releaseid"),
    (KEY_SKILLS_SCANNER, "usertasks.assignment.strategy.custom.dmn.scannerinterval"),
    (KEY_SKILLS_MODEL, "usertasks.assignment.strategy.custom.dmn.model.name"),
    (KEY_WORKLOAD_ENABLED, "usertasks.assignment.strategy.custom.filters.workload"),
    (
        KEY_WORKLOAD_CALCULATOR,
        "usertasks.assignment.strategy.custom.drools.filters.workload.calculator",
    ),
];

/// Raw strategy configuration, as written by operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Whether assignment is enabled (consumed by the caller)
    pub assignment_enabled: bool,

    /// Per-call timeout for collaborator lookups
    pub lookup_timeout_ms: Option<u64>,

    /// Skill rules deployment
    pub rules: ReleaseConfig,

    /// Skill decision deployment
    pub skills: SkillsConfig,

    /// Workload balancing
    pub workload: WorkloadConfig,
}

/// Deployment of a rule or decision release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// `group:artifact:version`
    pub release_id: Option<String>,

    /// Scanner polling interval; no scanning when absent
    pub scanner_interval_ms: Option<u64>,

    /// Base URL of a remote execution server; in-process backends when absent
    pub endpoint: Option<String>,

    /// Container id on the server; defaults to the artifact id
    pub container: Option<String>,
}

/// Skill decision deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Release settings
    #[serde(flatten)]
    pub release: ReleaseConfig,

    /// Decision model name
    pub model_name: Option<String>,
}

/// Workload balancing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Deployment-wide default; tasks may override it
    pub enabled: bool,

    /// Load metric identifier
    pub calculator: Option<String>,
}

impl StrategyConfig {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Build from a flat property map.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_properties(props)?;
        Ok(config)
    }

    /// Override settings with the non-empty entries of a property map.
    ///
    /// Each setting is read from its `delegate.*` key, or else from the
    /// jBPM system property of the same meaning (see [`JBPM_KEYS`]).
    pub fn apply_properties(&mut self, props: &HashMap<String, String>) -> Result<(), ConfigError> {
        let get = |key: &'static str| property(props, key);

        if let Some((k, v)) = get(KEY_ASSIGNMENT_ENABLED) {
            self.assignment_enabled = parse_flag(k, v)?;
        }
        if let Some((k, v)) = get(KEY_LOOKUP_TIMEOUT) {
            self.lookup_timeout_ms = Some(parse_millis(k, v)?);
        }
        if let Some((_, v)) = get(KEY_RULES_RELEASE) {
            self.rules.release_id = Some(v.to_string());
        }
        if let Some((k, v)) = get(KEY_RULES_SCANNER) {
            self.rules.scanner_interval_ms = Some(parse_millis(k, v)?);
        }
        if let Some((_, v)) = get(KEY_RULES_ENDPOINT) {
            self.rules.endpoint = Some(v.to_string());
        }
        if let Some((_, v)) = get(KEY_SKILLS_RELEASE) {
            self.skills.release.release_id = Some(v.to_string());
        }
        if let Some((k, v)) = get(KEY_SKILLS_SCANNER) {
            self.skills.release.scanner_interval_ms = Some(parse_millis(k, v)?);
        }
        if let Some((_, v)) = get(KEY_SKILLS_ENDPOINT) {
            self.skills.release.endpoint = Some(v.to_string());
        }
        if let Some((_, v)) = get(KEY_SKILLS_MODEL) {
            self.skills.model_name = Some(v.to_string());
        }
        if let Some((k, v)) = get(KEY_WORKLOAD_ENABLED) {
            self.workload.enabled = parse_flag(k, v)?;
        }
        if let Some((_, v)) = get(KEY_WORKLOAD_CALCULATOR) {
            self.workload.calculator = Some(v.to_string());
        }
        Ok(())
    }

    /// Validate and normalise.
    pub fn resolve(&self) -> Result<ResolvedConfig, ConfigError> {
        let rules = ReleaseSettings::resolve(&self.rules, KEY_RULES_RELEASE, KEY_RULES_SCANNER)?;

        let skills = match ReleaseSettings::resolve(&self.skills.release, KEY_SKILLS_RELEASE, KEY_SKILLS_SCANNER)? {
            Some(release) => {
                if rules.is_none() {
                    return Err(ConfigError::MissingSetting(KEY_RULES_RELEASE));
                }
                let model_name = self
                    .skills
                    .model_name
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SKILL_MODEL.to_string());
                Some(SkillSettings { release, model_name })
            }
            None => None,
        };

        let lookup_timeout = match self.lookup_timeout_ms {
            Some(0) => {
                return Err(ConfigError::InvalidInterval {
                    key: KEY_LOOKUP_TIMEOUT.to_string(),
                    value: "0".to_string(),
                })
            }
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        Ok(ResolvedConfig {
            assignment_enabled: self.assignment_enabled,
            rules,
            skills,
            workload_enabled: self.workload.enabled,
            calculator: self
                .workload
                .calculator
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| TASK_COUNT_METRIC.to_string()),
            lookup_timeout,
        })
    }
}

/// First non-empty value under `key` or its jBPM alias, with the key it came from.
fn property<'a>(props: &'a HashMap<String, String>, key: &'static str) -> Option<(&'static str, &'a str)> {
    let jbpm = JBPM_KEYS.iter().find(|(k, _)| *k == key).map(|(_, alias)| *alias);
    [Some(key), jbpm].into_iter().flatten().find_map(|k| {
        props
            .get(k)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| (k, v))
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigError::InvalidFlag {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidInterval {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Maven-style release coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseId {
    /// Group id
    pub group_id: String,
    /// Artifact id
    pub artifact_id: String,
    /// Version
    pub version: String,
}

impl ReleaseId {
    /// Parse `group:artifact:version`.
    pub fn parse(value: &str) -> Option<Self> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let pattern = PATTERN
            .get_or_init(|| Regex::new(r"^([A-Za-z0-9_.\-]+):([A-Za-z0-9_.\-]+):([A-Za-z0-9_.\-]+)$").ok())
            .as_ref()?;

        let caps = pattern.captures(value.trim())?;
        Some(Self {
            group_id: caps[1].to_string(),
            artifact_id: caps[2].to_string(),
            version: caps[3].to_string(),
        })
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// A validated release deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSettings {
    /// Release coordinates
    pub release_id: ReleaseId,
    /// Scanner polling interval
    pub scanner_interval: Option<Duration>,
    /// Remote server base URL
    pub endpoint: Option<String>,
    /// Container id on the server
    pub container: String,
}

impl ReleaseSettings {
    fn resolve(raw: &ReleaseConfig, release_key: &str, scanner_key: &str) -> Result<Option<Self>, ConfigError> {
        let Some(value) = raw.release_id.as_deref().filter(|v| !v.trim().is_empty()) else {
            return Ok(None);
        };

        let release_id = ReleaseId::parse(value).ok_or_else(|| ConfigError::InvalidReleaseId {
            key: release_key.to_string(),
            value: value.to_string(),
        })?;

        let scanner_interval = match raw.scanner_interval_ms {
            Some(0) => {
                return Err(ConfigError::InvalidInterval {
                    key: scanner_key.to_string(),
                    value: "0".to_string(),
                })
            }
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        let container = raw
            .container
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| release_id.artifact_id.clone());

        Ok(Some(Self {
            release_id,
            scanner_interval,
            endpoint: raw.endpoint.clone().filter(|e| !e.trim().is_empty()),
            container,
        }))
    }
}

/// Skill matching settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillSettings {
    /// Decision release
    pub release: ReleaseSettings,
    /// Decision model name
    pub model_name: String,
}

/// Validated configuration, read once when the strategy is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Whether assignment is enabled (consumed by the caller)
    pub assignment_enabled: bool,
    /// Skill rules deployment
    pub rules: Option<ReleaseSettings>,
    /// Skill decision deployment; `Some` enables skills matching
    pub skills: Option<SkillSettings>,
    /// Deployment-wide workload flag
    pub workload_enabled: bool,
    /// Load metric identifier
    pub calculator: String,
    /// Per-call timeout for collaborator lookups
    pub lookup_timeout: Option<Duration>,
}

impl ResolvedConfig {
    /// Whether the skill stage runs.
    pub fn skills_feature_active(&self) -> bool {
        self.skills.is_some()
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            assignment_enabled: false,
            rules: None,
            skills: None,
            workload_enabled: false,
            calculator: TASK_COUNT_METRIC.to_string(),
            lookup_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_release_id_parse() {
        let id = ReleaseId::parse("com.acme:skills-matrix:1.0.0-SNAPSHOT").unwrap();
        assert_eq!(id.group_id, "com.acme");
        assert_eq!(id.artifact_id, "skills-matrix");
        assert_eq!(id.version, "1.0.0-SNAPSHOT");
        assert_eq!(id.to_string(), "com.acme:skills-matrix:1.0.0-SNAPSHOT");

        assert!(ReleaseId::parse("com.acme:skills-matrix").is_none());
        assert!(ReleaseId::parse("a:b:c:d").is_none());
        assert!(ReleaseId::parse("a::c").is_none());
    }

    #[test]
    fn test_default_config_disables_everything() {
        let resolved = StrategyConfig::default().resolve().unwrap();
        assert!(!resolved.skills_feature_active());
        assert!(!resolved.workload_enabled);
        assert_eq!(resolved.calculator, TASK_COUNT_METRIC);
        assert_eq!(resolved, ResolvedConfig::default());
    }

    #[test]
    fn test_skills_release_activates_skills() {
        let config = StrategyConfig::from_properties(&props(&[
            (KEY_RULES_RELEASE, "com.acme:rules:1.0"),
            (KEY_SKILLS_RELEASE, "com.acme:skills:2.0"),
            (KEY_SKILLS_SCANNER, "30000"),
        ]))
        .unwrap();

        let resolved = config.resolve().unwrap();
        let skills = resolved.skills.as_ref().unwrap();
        assert!(resolved.skills_feature_active());
        assert_eq!(skills.model_name, DEFAULT_SKILL_MODEL);
        assert_eq!(skills.release.container, "skills");
        assert_eq!(skills.release.scanner_interval, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_empty_skills_release_means_inactive() {
        let config = StrategyConfig::from_properties(&props(&[(KEY_SKILLS_RELEASE, "  ")])).unwrap();
        assert!(!config.resolve().unwrap().skills_feature_active());
    }

    #[test]
    fn test_skills_without_rules_is_rejected() {
        let config = StrategyConfig::from_properties(&props(&[(KEY_SKILLS_RELEASE, "com.acme:skills:2.0")])).unwrap();
        assert!(matches!(
            config.resolve(),
            Err(ConfigError::MissingSetting(KEY_RULES_RELEASE))
        ));
    }

    #[test]
    fn test_malformed_release_is_rejected() {
        let config = StrategyConfig::from_properties(&props(&[(KEY_RULES_RELEASE, "com.acme/rules")])).unwrap();
        let err = config.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidReleaseId { .. }));
        assert!(err.to_string().contains(KEY_RULES_RELEASE));
    }

    #[test]
    fn test_unparsable_interval_is_rejected() {
        let err = StrategyConfig::from_properties(&props(&[(KEY_RULES_SCANNER, "every minute")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInterval { .. }));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = StrategyConfig::from_properties(&props(&[
            (KEY_RULES_RELEASE, "com.acme:rules:1.0"),
            (KEY_RULES_SCANNER, "0"),
        ]))
        .unwrap();
        assert!(matches!(config.resolve(), Err(ConfigError::InvalidInterval { .. })));
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        let err = StrategyConfig::from_properties(&props(&[(KEY_WORKLOAD_ENABLED, "sometimes")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlag { .. }));
    }

    #[test]
    fn test_toml_file_then_property_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
assignment_enabled = true
lookup_timeout_ms = 1500

[rules]
release_id = "com.acme:rules:1.0"
scanner_interval_ms = 60000

[skills]
release_id = "com.acme:skills:1.0"
container = "skills-prod"
model_name = "Matrix"

[workload]
enabled = false
calculator = "none"
"#
        )
        .unwrap();

        let mut config = StrategyConfig::from_file(file.path()).unwrap();
        config
            .apply_properties(&props(&[(KEY_WORKLOAD_ENABLED, "TRUE"), (KEY_SKILLS_MODEL, "")]))
            .unwrap();

        let resolved = config.resolve().unwrap();
        assert!(resolved.assignment_enabled);
        assert!(resolved.workload_enabled);
        assert_eq!(resolved.calculator, "none");
        assert_eq!(resolved.lookup_timeout, Some(Duration::from_millis(1500)));
        let skills = resolved.skills.unwrap();
        assert_eq!(skills.model_name, "Matrix");
        assert_eq!(skills.release.container, "skills-prod");
        assert_eq!(resolved.rules.unwrap().scanner_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_jbpm_property_keys_are_accepted() {
        let config = StrategyConfig::from_properties(&props(&[
            ("usertasks.assignment.strategy.custom.drools.releaseid", "com.acme:rules:1.0"),
            ("usertasks.assignment.strategy.custom.drools.scannerinterval", "10000"),
            ("usertasks.assignment.strategy.custom.dmn.releaseid", "com.acme:skills:2.0"),
            ("usertasks.assignment.strategy.custom.dmn.model.name", "Matrix"),
            ("usertasks.assignment.strategy.custom.filters.workload", "true"),
            ("usertasks.assignment.strategy.custom.drools.filters.workload.calculator", "none"),
        ]))
        .unwrap();

        let resolved = config.resolve().unwrap();
        assert!(resolved.skills_feature_active());
        assert!(resolved.workload_enabled);
        assert_eq!(resolved.calculator, "none");
        assert_eq!(resolved.skills.unwrap().model_name, "Matrix");
        let rules = resolved.rules.unwrap();
        assert_eq!(rules.release_id.artifact_id, "rules");
        assert_eq!(rules.scanner_interval, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_delegate_key_wins_over_jbpm_key() {
        let config = StrategyConfig::from_properties(&props(&[
            (KEY_WORKLOAD_CALCULATOR, "task-count"),
            ("usertasks.assignment.strategy.custom.drools.filters.workload.calculator", "none"),
        ]))
        .unwrap();
        assert_eq!(config.workload.calculator.as_deref(), Some("task-count"));
    }

    #[test]
    fn test_invalid_jbpm_flag_names_its_key() {
        let err = StrategyConfig::from_properties(&props(&[(
            "usertasks.assignment.strategy.custom.filters.workload",
            "yes",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFlag { ref key, .. } if key.starts_with("usertasks.")));
    }

    #[test]
    fn test_rules_release_alone_is_valid() {
        let resolved = StrategyConfig::from_properties(&props(&[(KEY_RULES_RELEASE, "com.acme:rules:1.0")]))
            .unwrap()
            .resolve()
            .unwrap();
        assert!(resolved.rules.is_some());
        assert!(!resolved.skills_feature_active());
    }

    #[test]
    fn test_toml_type_error_is_config_error() {
        let err = StrategyConfig::from_toml("[rules]\nscanner_interval_ms = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
