use crate::error::ProviderError;
use crate::providers::{GenerativeModel, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const CHAT_COMPLETIONS_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "mistral-small-latest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.2;

/// Mistral hosted API through the OpenAI-style chat-completions endpoint.
pub struct MistralModel {
    client: Client,
    api_key: String,
    model: String,
    url: String,
}

impl MistralModel {
    pub fn new(api_key: String, model: Option<&str>) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            url: CHAT_COMPLETIONS_URL.to_string(),
        })
    }
}

#[async_trait]
impl GenerativeModel for MistralModel {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mistral
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let parsed: Value = response.json().await?;

        if !status.is_success() {
            let details = parsed
                .pointer("/message")
                .or_else(|| parsed.pointer("/error/message"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(ProviderError::Api {
                provider: "mistral".to_string(),
                details,
            });
        }

        parse_chat_response(&parsed)
    }
}

pub(crate) fn parse_chat_response(parsed: &Value) -> Result<String, ProviderError> {
    let text = parsed
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::EmptyResponse {
            provider: "mistral".to_string(),
        });
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_content_is_extracted() {
        let response = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Grounded answer."}}
            ],
            "usage": {"prompt_tokens": 100, "completion_tokens": 20}
        });

        let text = parse_chat_response(&response).expect("text should parse");
        assert_eq!(text, "Grounded answer.");
    }

    #[test]
    fn empty_choices_map_to_empty_response() {
        assert!(matches!(
            parse_chat_response(&json!({"choices": []})),
            Err(ProviderError::EmptyResponse { .. })
        ));
    }
}
