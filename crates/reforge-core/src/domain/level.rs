//! Validation depth levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{ReforgeError, Result};

/// Cost/quality tradeoff requested for a validation.
///
/// `Quick` maps to a cheap, fast model; `Thorough` to an expensive, careful one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Quick,
    #[default]
    Standard,
    Thorough,
}

impl ValidationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationLevel::Quick => "quick",
            ValidationLevel::Standard => "standard",
            ValidationLevel::Thorough => "thorough",
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationLevel {
    type Err = ReforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quick" => Ok(ValidationLevel::Quick),
            "standard" => Ok(ValidationLevel::Standard),
            "thorough" => Ok(ValidationLevel::Thorough),
            other => Err(ReforgeError::InvalidConfig(format!(
                "unknown validation level: {other}"
            ))),
        }
    }
}
