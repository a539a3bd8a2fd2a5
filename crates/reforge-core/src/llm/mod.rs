//! Text-generation and model-selection seams.
//!
//! The core treats both as black boxes:
//! - [`TextGenerator`]: `prompt + model + sampling → text`
//! - [`ModelSelector`]: model choice per (task, level) plus token/cost estimates
//!
//! [`HttpTextGenerator`] talks to an OpenAI-compatible endpoint; in-memory
//! fakes live in [`fakes`].

pub mod fakes;
pub mod http;
pub mod selector;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::{HttpGeneratorConfig, HttpTextGenerator};
pub use selector::{ModelSelector, ModelTier, ModelTiers, TieredModelSelector};

/// Errors produced by a [`TextGenerator`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream returned an empty response")]
    EmptyResponse,

    #[error("generation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("{0}")]
    Other(String),
}

/// One call to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Whether the collaborator may substitute another provider/model.
    /// The validator runner always sends `false` so the selected model is
    /// the one that judges.
    pub allow_fallback: bool,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            temperature: 0.1,
            max_tokens: 4096,
            allow_fallback: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Text-generation backend.
///
/// Implementations own retries, timeouts and any provider fallback; the core
/// never retries a call itself.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
