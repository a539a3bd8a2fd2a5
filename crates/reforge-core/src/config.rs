//! Configuration objects for the runner and the refinement loop.
//!
//! Everything is passed explicitly; nothing is read from process-wide state.
//! [`ReforgeConfig`] aggregates the sections and can be loaded from TOML:
//!
//! ```toml
//! [runner]
//! default_temperature = 0.1
//! max_tokens = 4096
//!
//! [runner.temperatures]
//! documentation = 0.2
//!
//! [refinement]
//! max_iterations = 3
//! min_score_threshold = 85.0
//!
//! [models.quick]
//! model = "gpt-4o-mini"
//! input_usd_per_mtok = 0.15
//! output_usd_per_mtok = 0.6
//!
//! [templates]
//! security = """Audit {artifact} ..."""
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ReforgeError, Result};
use crate::llm::ModelTiers;
use crate::templates::TemplateRegistry;

/// Validator runner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Temperature for validators without an override. Judges are not creative.
    pub default_temperature: f32,
    /// Per-validator temperature overrides.
    pub temperatures: BTreeMap<String, f32>,
    pub max_tokens: u32,
    /// Nominal prompt size used for cost estimation.
    pub nominal_input_tokens: u64,
    /// Confidence assigned to findings that do not state one.
    pub default_confidence: f32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_temperature: 0.1,
            temperatures: BTreeMap::from([("documentation".to_string(), 0.2)]),
            max_tokens: 4096,
            nominal_input_tokens: 2000,
            default_confidence: 0.9,
        }
    }
}

impl RunnerConfig {
    pub fn temperature_for(&self, validator: &str) -> f32 {
        self.temperatures
            .get(validator)
            .copied()
            .unwrap_or(self.default_temperature)
    }

    pub fn validate(&self) -> Result<()> {
        let temps = std::iter::once(self.default_temperature).chain(self.temperatures.values().copied());
        for t in temps {
            if !(0.0..=2.0).contains(&t) {
                return Err(ReforgeError::InvalidConfig(format!(
                    "temperature {t} is outside [0, 2]"
                )));
            }
        }
        if self.max_tokens == 0 {
            return Err(ReforgeError::InvalidConfig(
                "max_tokens must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            return Err(ReforgeError::InvalidConfig(format!(
                "default_confidence {} is outside [0, 1]",
                self.default_confidence
            )));
        }
        Ok(())
    }
}

/// Refinement loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Iteration budget, in [1, 10].
    pub max_iterations: u32,
    /// Minimum average score for convergence, in [0, 100].
    pub min_score_threshold: f64,
    /// Accept a WARNING report with no critical findings.
    pub allow_partial: bool,
    /// Attempts at structured feedback extraction before falling back to the
    /// manual heuristic. 1 means no retry.
    pub structured_feedback_attempts: u32,
    /// Cap on structured feedback items.
    pub max_structured_items: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            min_score_threshold: 85.0,
            allow_partial: false,
            structured_feedback_attempts: 1,
            max_structured_items: 10,
        }
    }
}

impl RefinementConfig {
    pub const MAX_ITERATIONS_LIMIT: u32 = 10;

    pub fn new(max_iterations: u32, min_score_threshold: f64) -> Result<Self> {
        let config = Self {
            max_iterations,
            min_score_threshold,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_allow_partial(mut self, allow_partial: bool) -> Self {
        self.allow_partial = allow_partial;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=Self::MAX_ITERATIONS_LIMIT).contains(&self.max_iterations) {
            return Err(ReforgeError::InvalidConfig(format!(
                "max_iterations must be in [1, {}], got {}",
                Self::MAX_ITERATIONS_LIMIT,
                self.max_iterations
            )));
        }
        if !self.min_score_threshold.is_finite()
            || !(0.0..=100.0).contains(&self.min_score_threshold)
        {
            return Err(ReforgeError::InvalidConfig(format!(
                "min_score_threshold must be in [0, 100], got {}",
                self.min_score_threshold
            )));
        }
        if self.structured_feedback_attempts == 0 {
            return Err(ReforgeError::InvalidConfig(
                "structured_feedback_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_structured_items == 0 {
            return Err(ReforgeError::InvalidConfig(
                "max_structured_items must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whole-application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReforgeConfig {
    pub runner: RunnerConfig,
    pub refinement: RefinementConfig,
    pub models: ModelTiers,
    /// Live validator templates, by name.
    pub templates: BTreeMap<String, String>,
}

impl ReforgeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: ReforgeConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.runner.validate()?;
        self.refinement.validate()
    }

    /// Built-in fallbacks plus the configured live templates.
    pub fn template_registry(&self) -> Result<TemplateRegistry> {
        TemplateRegistry::new().with_templates(self.templates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ReforgeConfig::default().validate().unwrap();
        let runner = RunnerConfig::default();
        assert_eq!(runner.temperature_for("code"), 0.1);
        assert_eq!(runner.temperature_for("documentation"), 0.2);
    }

    #[test]
    fn refinement_bounds_are_enforced() {
        assert!(RefinementConfig::new(0, 80.0).is_err());
        assert!(RefinementConfig::new(11, 80.0).is_err());
        assert!(RefinementConfig::new(1, -0.5).is_err());
        assert!(RefinementConfig::new(1, 100.5).is_err());
        assert!(RefinementConfig::new(10, 100.0).is_ok());
        assert!(RefinementConfig::new(1, 0.0).is_ok());
    }

    #[test]
    fn parses_toml_with_partial_sections() {
        let config = ReforgeConfig::from_toml_str(
            r#"
            [runner]
            max_tokens = 1024

            [runner.temperatures]
            tests = 0.15

            [refinement]
            max_iterations = 5
            allow_partial = true

            [models.quick]
            model = "local-small"
            input_usd_per_mtok = 0.0
            output_usd_per_mtok = 0.0

            [templates]
            security = "Audit this: {artifact}"
            "#,
        )
        .unwrap();

        assert_eq!(config.runner.max_tokens, 1024);
        assert_eq!(config.runner.temperature_for("tests"), 0.15);
        assert_eq!(config.refinement.max_iterations, 5);
        assert!(config.refinement.allow_partial);
        assert_eq!(config.refinement.min_score_threshold, 85.0);
        assert_eq!(config.models.quick.model, "local-small");
        assert_eq!(config.models.standard.model, "gpt-4o");

        let registry = config.template_registry().unwrap();
        assert!(registry.contains("security"));
        assert!(registry.contains("code"));
    }

    #[test]
    fn rejects_out_of_range_toml() {
        let err = ReforgeConfig::from_toml_str("[refinement]\nmax_iterations = 42\n").unwrap_err();
        assert!(matches!(err, ReforgeError::InvalidConfig(_)));

        let err = ReforgeConfig::from_toml_str("[runner]\nmax_tokens = \"lots\"\n").unwrap_err();
        assert!(matches!(err, ReforgeError::ConfigDecode(_)));
    }
}
