//! The `TextGenerator` trait: the seam between content orchestration and a
//! hosted generative-text model.
//!
//! The production implementation is [`gemini::GeminiGenerator`]. Tests plug
//! in their own implementations.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::{GeminiConfig, GeminiGenerator};

/// Sampling knobs forwarded to the model.
///
/// Unset fields fall back to [`GenerationConfig::defaults`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    pub const DEFAULT_TOP_P: f64 = 0.95;
    pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

    /// Every field set to its default.
    pub fn defaults() -> Self {
        Self {
            temperature: Some(Self::DEFAULT_TEMPERATURE),
            top_p: Some(Self::DEFAULT_TOP_P),
            max_output_tokens: Some(Self::DEFAULT_MAX_OUTPUT_TOKENS),
        }
    }

    /// Overlay `overrides` on the defaults. Caller-supplied fields win.
    pub fn merged_over_defaults(overrides: Option<&GenerationConfig>) -> Self {
        let base = Self::defaults();
        match overrides {
            None => base,
            Some(o) => Self {
                temperature: o.temperature.or(base.temperature),
                top_p: o.top_p.or(base.top_p),
                max_output_tokens: o.max_output_tokens.or(base.max_output_tokens),
            },
        }
    }
}

/// Errors a [`TextGenerator`] may report. The orchestrator treats every
/// variant the same way: it falls back to deterministic content.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("prompt cannot be empty")]
    EmptyPrompt,

    #[error("generator is not configured: {0}")]
    NotConfigured(String),

    #[error("request to generator failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("generator returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected generator response: {0}")]
    InvalidResponse(String),

    #[error("content generation failed: {0}")]
    Other(String),
}

/// A hosted model that turns a prompt into text.
///
/// Object-safe so it can be shared as `Arc<dyn TextGenerator>`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short identifier used in logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate text for `prompt`. Implementations must reject an empty
    /// prompt with [`GeneratorError::EmptyPrompt`].
    async fn generate(
        &self,
        prompt: &str,
        config: Option<&GenerationConfig>,
    ) -> Result<String, GeneratorError>;

    /// Probe the model with a trivial prompt.
    async fn is_healthy(&self) -> bool {
        matches!(self.generate("Test connection", None).await, Ok(text) if !text.is_empty())
    }
}

const _: () = {
    fn _assert_object_safe(_: &dyn TextGenerator) {}
};

/// Stand-in used when no model client could be built. Every call fails
/// with [`GeneratorError::NotConfigured`], so every operation falls back.
#[derive(Debug, Clone)]
pub struct UnavailableGenerator {
    reason: String,
}

impl UnavailableGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for UnavailableGenerator {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn generate(
        &self,
        prompt: &str,
        _config: Option<&GenerationConfig>,
    ) -> Result<String, GeneratorError> {
        if prompt.is_empty() {
            return Err(GeneratorError::EmptyPrompt);
        }
        Err(GeneratorError::NotConfigured(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(
            &self,
            prompt: &str,
            _config: Option<&GenerationConfig>,
        ) -> Result<String, GeneratorError> {
            if prompt.is_empty() {
                return Err(GeneratorError::EmptyPrompt);
            }
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn usable_as_trait_object() {
        let generator: Arc<dyn TextGenerator> = Arc::new(EchoGenerator);
        assert_eq!(generator.name(), "echo");
        assert_eq!(generator.generate("hi", None).await.unwrap(), "hi");
        assert!(matches!(
            generator.generate("", None).await,
            Err(GeneratorError::EmptyPrompt)
        ));
        assert!(generator.is_healthy().await);
    }

    #[tokio::test]
    async fn unavailable_generator_always_fails() {
        let generator = UnavailableGenerator::new("no API key");
        assert!(matches!(
            generator.generate("hello", None).await,
            Err(GeneratorError::NotConfigured(reason)) if reason == "no API key"
        ));
        assert!(!generator.is_healthy().await);
    }

    #[test]
    fn merge_prefers_caller_values() {
        let merged = GenerationConfig::merged_over_defaults(Some(&GenerationConfig {
            temperature: Some(0.2),
            ..Default::default()
        }));
        assert_eq!(merged.temperature, Some(0.2));
        assert_eq!(merged.top_p, Some(0.95));
        assert_eq!(merged.max_output_tokens, Some(2048));

        assert_eq!(
            GenerationConfig::merged_over_defaults(None),
            GenerationConfig::defaults()
        );
    }

    #[test]
    fn deserializes_partial_objects() {
        let cfg: GenerationConfig = serde_json::from_str(r#"{"max_output_tokens": 300}"#).unwrap();
        assert_eq!(cfg.max_output_tokens, Some(300));
        assert_eq!(cfg.temperature, None);

        let json = serde_json::to_value(cfg).unwrap();
        assert_eq!(json, serde_json::json!({ "max_output_tokens": 300 }));
    }
}
