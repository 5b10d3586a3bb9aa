//! Gemini `generateContent` REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, error};

use super::{GenerationConfig, GeneratorError, TextGenerator};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MIN_API_KEY_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Check the key is present and plausibly shaped.
    pub fn validate(&self) -> Result<(), GeneratorError> {
        if self.api_key.is_empty() {
            return Err(GeneratorError::NotConfigured(
                "Gemini API key not found".to_string(),
            ));
        }
        if self.api_key.len() < MIN_API_KEY_LEN {
            return Err(GeneratorError::NotConfigured(
                "Invalid Gemini API key format".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 60,
        }
    }
}

pub struct GeminiGenerator {
    client: Client,
    config: GeminiConfig,
}

impl GeminiGenerator {
    /// Build a client. Fails if the API key is missing or malformed.
    pub fn new(config: GeminiConfig) -> Result<Self, GeneratorError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Request body for one single-turn prompt.
    pub fn build_request_body(prompt: &str, config: &GenerationConfig) -> Value {
        let mut generation_config = json!({});
        if let Some(t) = config.temperature {
            generation_config["temperature"] = json!(t);
        }
        if let Some(p) = config.top_p {
            generation_config["topP"] = json!(p);
        }
        if let Some(n) = config.max_output_tokens {
            generation_config["maxOutputTokens"] = json!(n);
        }

        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        })
    }

    /// Concatenate the text parts of the first candidate.
    pub fn parse_response(body: &str) -> Result<String, GeneratorError> {
        let json: Value = serde_json::from_str(body)
            .map_err(|e| GeneratorError::InvalidResponse(e.to_string()))?;

        if let Some(err) = json.get("error") {
            let message = err["message"].as_str().unwrap_or("unknown error");
            return Err(GeneratorError::Other(message.to_string()));
        }

        let parts = json["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| {
                let reason = json["promptFeedback"]["blockReason"]
                    .as_str()
                    .or_else(|| json["candidates"][0]["finishReason"].as_str())
                    .unwrap_or("no candidates");
                GeneratorError::InvalidResponse(format!("response has no text ({reason})"))
            })?;

        Ok(parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<String>())
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        prompt: &str,
        config: Option<&GenerationConfig>,
    ) -> Result<String, GeneratorError> {
        if prompt.is_empty() {
            return Err(GeneratorError::EmptyPrompt);
        }

        let merged = GenerationConfig::merged_over_defaults(config);
        let body = Self::build_request_body(prompt, &merged);
        let url = self.endpoint();
        debug!(model = %self.config.model, prompt_len = prompt.len(), "calling gemini");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!(status = status.as_u16(), "gemini request failed");
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        Self::parse_response(&text)
    }
}
