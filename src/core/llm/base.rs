//! Text generation over a finished transcript.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::InstanceCredentials;

/// Sampling temperature used by the built-in models.
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
/// Nucleus sampling cutoff used by the built-in models.
pub const DEFAULT_TOP_P: f32 = 0.9;
/// Output token cap used by the built-in models.
pub const DEFAULT_MAX_TOKENS: i32 = 1000;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("Invalid inference request: {0}")]
    InvalidRequest(String),

    #[error("Bedrock API call failed: {0}")]
    Provider(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

/// A model the relay may be asked for by name.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    /// Provider model id
    pub id: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: i32,
}

impl ModelSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Models available when the configuration does not list any.
pub fn default_models() -> BTreeMap<String, ModelSpec> {
    BTreeMap::from([
        (
            "claude-3-haiku".to_string(),
            ModelSpec::new("anthropic.claude-3-haiku-20240307-v1:0"),
        ),
        (
            "claude-3-5-haiku".to_string(),
            ModelSpec::new("anthropic.claude-3-5-haiku-20241022-v1:0"),
        ),
    ])
}

/// A text generation backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run `input` as a single user turn under `system_prompt` and return the
    /// model's text.
    async fn generate(
        &self,
        credentials: &InstanceCredentials,
        model: &ModelSpec,
        system_prompt: &str,
        input: &str,
    ) -> Result<String, LlmError>;

    fn provider_info(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models() {
        let models = default_models();
        assert_eq!(models.len(), 2);

        let haiku = &models["claude-3-haiku"];
        assert_eq!(haiku.id, "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(haiku.temperature, 0.5);
        assert_eq!(haiku.top_p, 0.9);
        assert_eq!(haiku.max_tokens, 1000);

        assert_eq!(
            models["claude-3-5-haiku"].id,
            "anthropic.claude-3-5-haiku-20241022-v1:0"
        );
    }
}
