use crate::error::ProviderError;
use crate::providers::{GenerativeModel, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_OUTPUT_TOKENS: u32 = 2048;
const TEMPERATURE: f32 = 0.2;

/// Google Gemini over the REST `generateContent` endpoint.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: String, model: Option<&str>) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            base_url: BASE_URL.to_string(),
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "topK": 40,
                "topP": 0.8,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            }
        });

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        let parsed: Value = response.json().await?;

        if !status.is_success() {
            let details = parsed
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(ProviderError::Api {
                provider: "gemini".to_string(),
                details,
            });
        }

        parse_generate_response(&parsed)
    }
}

pub(crate) fn parse_generate_response(parsed: &Value) -> Result<String, ProviderError> {
    let candidate = parsed
        .pointer("/candidates/0")
        .ok_or(ProviderError::EmptyResponse {
            provider: "gemini".to_string(),
        })?;

    if candidate.pointer("/finishReason").and_then(Value::as_str) == Some("SAFETY") {
        return Err(ProviderError::ContentFiltered {
            provider: "gemini".to_string(),
        });
    }

    let text = candidate
        .pointer("/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::EmptyResponse {
            provider: "gemini".to_string(),
        });
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_candidate_text_is_extracted() {
        let response = json!({
            "candidates": [{
                "content": {"parts": [{"text": "  The document covers risk.  "}]},
                "finishReason": "STOP",
            }]
        });

        let text = parse_generate_response(&response).expect("text should parse");
        assert_eq!(text, "The document covers risk.");
    }

    #[test]
    fn safety_block_maps_to_content_filtered() {
        let response = json!({
            "candidates": [{"finishReason": "SAFETY"}]
        });

        assert!(matches!(
            parse_generate_response(&response),
            Err(ProviderError::ContentFiltered { .. })
        ));
    }

    #[test]
    fn missing_candidates_map_to_empty_response() {
        assert!(matches!(
            parse_generate_response(&json!({"candidates": []})),
            Err(ProviderError::EmptyResponse { .. })
        ));
        assert!(matches!(
            parse_generate_response(&json!({
                "candidates": [{"content": {"parts": [{"text": "   "}]}}]
            })),
            Err(ProviderError::EmptyResponse { .. })
        ));
    }
}
