//! Model selection and cost estimation.

use serde::{Deserialize, Serialize};

use crate::domain::ValidationLevel;

/// Chooses a model and prices calls.
pub trait ModelSelector: Send + Sync {
    /// Model id for a task type (validator name, `"feedback"`, ...) at `level`.
    fn select_model(&self, task_type: &str, level: ValidationLevel) -> String;

    /// Rough token count of `text`.
    fn estimate_tokens(&self, text: &str) -> u64 {
        (text.chars().count() as u64).div_ceil(4)
    }

    /// Estimated USD cost of a call.
    fn estimate_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64;
}

/// A model and its pricing (USD per million tokens).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTier {
    pub model: String,
    pub input_usd_per_mtok: f64,
    pub output_usd_per_mtok: f64,
}

impl ModelTier {
    pub fn new(model: impl Into<String>, input_usd_per_mtok: f64, output_usd_per_mtok: f64) -> Self {
        Self {
            model: model.into(),
            input_usd_per_mtok,
            output_usd_per_mtok,
        }
    }

    fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_usd_per_mtok
            + output_tokens as f64 * self.output_usd_per_mtok)
            / 1_000_000.0
    }
}

/// One tier per validation level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTiers {
    pub quick: ModelTier,
    pub standard: ModelTier,
    pub thorough: ModelTier,
}

impl Default for ModelTiers {
    fn default() -> Self {
        Self {
            quick: ModelTier::new("gpt-4o-mini", 0.15, 0.60),
            standard: ModelTier::new("gpt-4o", 2.50, 10.00),
            thorough: ModelTier::new("o1", 15.00, 60.00),
        }
    }
}

impl ModelTiers {
    pub fn for_level(&self, level: ValidationLevel) -> &ModelTier {
        match level {
            ValidationLevel::Quick => &self.quick,
            ValidationLevel::Standard => &self.standard,
            ValidationLevel::Thorough => &self.thorough,
        }
    }

    fn find(&self, model: &str) -> Option<&ModelTier> {
        [&self.quick, &self.standard, &self.thorough]
            .into_iter()
            .find(|t| t.model == model)
    }
}

/// Level-driven selector: every task type at a given level uses the same tier.
#[derive(Debug, Clone, Default)]
pub struct TieredModelSelector {
    tiers: ModelTiers,
}

impl TieredModelSelector {
    pub fn new(tiers: ModelTiers) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &ModelTiers {
        &self.tiers
    }
}

impl ModelSelector for TieredModelSelector {
    fn select_model(&self, _task_type: &str, level: ValidationLevel) -> String {
        self.tiers.for_level(level).model.clone()
    }

    /// Unknown models are priced at zero.
    fn estimate_cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        self.tiers
            .find(model)
            .map(|t| t.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_model_by_level() {
        let selector = TieredModelSelector::default();
        assert_eq!(
            selector.select_model("code", ValidationLevel::Quick),
            "gpt-4o-mini"
        );
        assert_eq!(
            selector.select_model("docs", ValidationLevel::Thorough),
            "o1"
        );
    }

    #[test]
    fn estimates_tokens_rounding_up() {
        let selector = TieredModelSelector::default();
        assert_eq!(selector.estimate_tokens(""), 0);
        assert_eq!(selector.estimate_tokens("abc"), 1);
        assert_eq!(selector.estimate_tokens("abcdefgh"), 2);
        assert_eq!(selector.estimate_tokens("abcdefghi"), 3);
    }

    #[test]
    fn prices_known_and_unknown_models() {
        let selector = TieredModelSelector::new(ModelTiers {
            quick: ModelTier::new("cheap", 1.0, 2.0),
            ..ModelTiers::default()
        });
        let cost = selector.estimate_cost("cheap", 1_000_000, 500_000);
        assert!((cost - 2.0).abs() < 1e-9);
        assert_eq!(selector.estimate_cost("mystery", 1000, 1000), 0.0);
    }
}
