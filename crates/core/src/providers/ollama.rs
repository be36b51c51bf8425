use crate::error::ProviderError;
use crate::providers::{GenerativeModel, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "llama3.2:1b";

// Local models can be slow to first token; the timeout is generous but still
// bounded so a wedged daemon cannot hang a request forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const NUM_PREDICT: u32 = 512;
const TEMPERATURE: f32 = 0.1;

/// Locally hosted Ollama daemon. The terminal fallback in the provider
/// chain: no credentials, assumed reachable.
pub struct OllamaModel {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaModel {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl GenerativeModel for OllamaModel {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": TEMPERATURE,
                "num_predict": NUM_PREDICT,
                "num_ctx": 2048,
                "top_k": 10,
                "top_p": 0.9,
                "repeat_penalty": 1.1,
            }
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                provider: "ollama".to_string(),
                details: format!("HTTP {status}"),
            });
        }

        let parsed: Value = response.json().await?;
        parse_generate_response(&parsed)
    }
}

pub(crate) fn parse_generate_response(parsed: &Value) -> Result<String, ProviderError> {
    let text = parsed
        .pointer("/response")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::EmptyResponse {
            provider: "ollama".to_string(),
        });
    }

    Ok(text.to_string())
}
