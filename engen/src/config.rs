//! Workflow configuration.
//!
//! Configuration comes from a TOML document, then environment overrides:
//!
//! - `ENGEN_THRESHOLD`: default gate threshold (0-100)
//! - `ENGEN_REVIEW_TIMEOUT_SECS`: review timeout in seconds, `0` to wait forever
//!
//! A timeout of `0` means no limit wherever it appears.
//!
//! ```toml
//! [gate]
//! default_threshold = 80
//! always_review = ["human_verification"]
//!
//! [gate.thresholds]
//! component_specification = 70
//!
//! [review]
//! timeout_seconds = 3600
//! audit_trail = true
//!
//! [review.timeouts]
//! document_generation = 172800
//! artifact_generation = 0
//! ```

use crate::core::{Score, StageId};
use crate::errors::ConfigError;
use crate::gate::{GatePolicy, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the default threshold.
pub const ENV_THRESHOLD: &str = "ENGEN_THRESHOLD";
/// Environment variable overriding the review timeout.
pub const ENV_REVIEW_TIMEOUT: &str = "ENGEN_REVIEW_TIMEOUT_SECS";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngenConfig {
    /// Gate thresholds.
    pub gate: GateConfig,
    /// Human review settings.
    pub review: ReviewConfig,
}

/// Gate thresholds, keyed by stage name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Threshold for stages without an override.
    pub default_threshold: f64,
    /// Per-stage overrides.
    pub thresholds: BTreeMap<String, f64>,
    /// Stages that go to review even when they pass.
    pub always_review: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            thresholds: BTreeMap::new(),
            always_review: Vec::new(),
        }
    }
}

/// Human review settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Seconds to wait for a reviewer; `None` or `0` waits indefinitely.
    pub timeout_seconds: Option<u64>,
    /// Per-stage limits in seconds, keyed by stage name or ordinal.
    pub timeouts: BTreeMap<String, u64>,
    /// Write each audit record to the `audit-trails` bucket.
    pub audit_trail: bool,
}

impl ReviewConfig {
    /// Returns the default review limit.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.timeout_seconds.and_then(limit)
    }

    /// Returns the per-stage limits; `None` entries wait indefinitely.
    pub fn stage_timeouts(&self) -> Result<BTreeMap<StageId, Option<Duration>>, ConfigError> {
        let mut limits = BTreeMap::new();
        for (name, secs) in &self.timeouts {
            let stage: StageId = name.parse()?;
            limits.insert(stage, limit(*secs));
        }
        Ok(limits)
    }

    /// Returns the limit that applies to `stage`.
    pub fn timeout_for(&self, stage: StageId) -> Result<Option<Duration>, ConfigError> {
        Ok(self
            .stage_timeouts()?
            .remove(&stage)
            .unwrap_or_else(|| self.default_timeout()))
    }
}

fn limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl EngenConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Loads the file if given (defaults otherwise), applies process
    /// environment overrides and validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_THRESHOLD) {
            self.gate.default_threshold = raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseFloatError| ConfigError::Env {
                    field: ENV_THRESHOLD.to_string(),
                    error: e.to_string(),
                })?;
        }
        if let Some(raw) = lookup(ENV_REVIEW_TIMEOUT) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::Env {
                    field: ENV_REVIEW_TIMEOUT.to_string(),
                    error: e.to_string(),
                })?;
            self.review.timeout_seconds = (secs > 0).then_some(secs);
        }
        Ok(())
    }

    /// Checks thresholds and stage names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_policy()?;
        self.review.stage_timeouts()?;
        Ok(())
    }

    /// Builds the gate policy.
    pub fn to_policy(&self) -> Result<GatePolicy, ConfigError> {
        let mut policy = GatePolicy::uniform(Score::new(self.gate.default_threshold)?);
        for (name, threshold) in &self.gate.thresholds {
            let stage: StageId = name.parse()?;
            policy = policy.with_threshold(stage, Score::new(*threshold)?);
        }
        for name in &self.gate.always_review {
            policy = policy.with_always_review(name.parse()?);
        }
        Ok(policy)
    }

    /// Returns the default review timeout.
    #[must_use]
    pub fn review_timeout(&self) -> Option<Duration> {
        self.review.default_timeout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngenConfig::default();
        assert_eq!(config.gate.default_threshold, 80.0);
        assert_eq!(config.review_timeout(), None);
        let policy = config.to_policy().unwrap();
        assert_eq!(policy.threshold_for(StageId::DiagramValidation).value(), 80.0);
        assert!(!policy.requires_review(StageId::HumanVerification));
    }

    #[test]
    fn test_parse_toml() {
        let config = EngenConfig::from_toml_str(
            r#"
            [gate]
            default_threshold = 75
            always_review = ["human_verification"]

            [gate.thresholds]
            component_specification = 60
            "4" = 90

            [review]
            timeout_seconds = 30
            "#,
        )
        .unwrap();

        let policy = config.to_policy().unwrap();
        assert_eq!(policy.default_threshold().value(), 75.0);
        assert_eq!(policy.threshold_for(StageId::ComponentSpecification).value(), 60.0);
        assert_eq!(policy.threshold_for(StageId::ArtifactGeneration).value(), 90.0);
        assert!(policy.requires_review(StageId::HumanVerification));
        assert_eq!(config.review_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngenConfig::from_toml_str("[review]\ntimeout_seconds = 5\n").unwrap();
        assert_eq!(config.gate, GateConfig::default());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = EngenConfig::default();
        config.gate.default_threshold = 120.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EngenConfig::default();
        config.gate.thresholds.insert("deploy".to_string(), 50.0);
        assert!(config.validate().unwrap_err().to_string().contains("deploy"));

        let mut config = EngenConfig::default();
        config.gate.always_review.push("6".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngenConfig::default();
        config
            .apply_env(env(&[(ENV_THRESHOLD, "65.5"), (ENV_REVIEW_TIMEOUT, "10")]))
            .unwrap();
        assert_eq!(config.gate.default_threshold, 65.5);
        assert_eq!(config.review.timeout_seconds, Some(10));

        config.apply_env(env(&[(ENV_REVIEW_TIMEOUT, "0")])).unwrap();
        assert_eq!(config.review.timeout_seconds, None);
    }

    #[test]
    fn test_zero_timeout_waits_forever() {
        let config = EngenConfig::from_toml_str("[review]\ntimeout_seconds = 0\n").unwrap();
        assert_eq!(config.review.timeout_seconds, Some(0));
        assert_eq!(config.review_timeout(), None);

        let mut config = EngenConfig::default();
        config.apply_env(env(&[(ENV_REVIEW_TIMEOUT, "0")])).unwrap();
        assert_eq!(config.review_timeout(), None);
    }

    #[test]
    fn test_stage_timeouts() {
        let config = EngenConfig::from_toml_str(
            r#"
            [review]
            timeout_seconds = 60
            audit_trail = true

            [review.timeouts]
            document_generation = 120
            "4" = 0
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert!(config.review.audit_trail);

        let review = &config.review;
        assert_eq!(
            review.timeout_for(StageId::DocumentGeneration).unwrap(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(review.timeout_for(StageId::ArtifactGeneration).unwrap(), None);
        assert_eq!(
            review.timeout_for(StageId::DiagramValidation).unwrap(),
            Some(Duration::from_secs(60))
        );

        let mut config = EngenConfig::default();
        config.review.timeouts.insert("publish".to_string(), 10);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = EngenConfig::default();
        let err = config.apply_env(env(&[(ENV_THRESHOLD, "high")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref field, .. } if field == ENV_THRESHOLD));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gate]\ndefault_threshold = 90").unwrap();

        let config = EngenConfig::from_file(file.path()).unwrap();
        assert_eq!(config.gate.default_threshold, 90.0);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngenConfig::from_file(dir.path().join("engen.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gate\ndefault_threshold =").unwrap();
        assert!(matches!(EngenConfig::from_file(file.path()), Err(ConfigError::Parse(_))));
    }
}
