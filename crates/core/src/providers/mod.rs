pub mod gemini;
pub mod mistral;
pub mod ollama;

pub use gemini::GeminiModel;
pub use mistral::MistralModel;
pub use ollama::OllamaModel;

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One interchangeable language-model backend: prompt in, text out. Adapters
/// normalize every provider to this shape; output length and sampling
/// temperature are fixed per adapter.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn kind(&self) -> ProviderKind;
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    Mistral,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested provider: a concrete backend or auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderChoice {
    #[default]
    Auto,
    Explicit(ProviderKind),
}

impl ProviderChoice {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(ProviderChoice::Auto),
            "gemini" => Some(ProviderChoice::Explicit(ProviderKind::Gemini)),
            "mistral" => Some(ProviderChoice::Explicit(ProviderKind::Mistral)),
            "ollama" => Some(ProviderChoice::Explicit(ProviderKind::Ollama)),
            _ => None,
        }
    }
}

/// Strict fallback order. Ollama is the terminal entry and is assumed always
/// reachable (local daemon).
const PRIORITY: [ProviderKind; 3] = [
    ProviderKind::Gemini,
    ProviderKind::Mistral,
    ProviderKind::Ollama,
];

/// Snapshot of provider credentials and endpoints, read from the environment
/// once at construction so availability checks stay cheap and consistent.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub gemini_api_key: Option<String>,
    pub mistral_api_key: Option<String>,
    pub ollama_url: String,
    pub ollama_model: String,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            gemini_api_key: non_empty_env("GEMINI_API_KEY"),
            mistral_api_key: non_empty_env("MISTRAL_API_KEY"),
            ollama_url: non_empty_env("OLLAMA_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            ollama_model: non_empty_env("OLLAMA_MODEL")
                .unwrap_or_else(|| ollama::DEFAULT_MODEL.to_string()),
        }
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        match kind {
            ProviderKind::Gemini => self.gemini_api_key.is_some(),
            ProviderKind::Mistral => self.mistral_api_key.is_some(),
            ProviderKind::Ollama => true,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

/// Picks the backend to use. `Auto` takes the highest-priority configured
/// provider; an explicit request that is not configured degrades down the
/// chain starting below the requested entry.
pub fn resolve_provider(choice: ProviderChoice, config: &ProviderConfig) -> ProviderKind {
    let start = match choice {
        ProviderChoice::Auto => 0,
        ProviderChoice::Explicit(requested) => {
            if config.is_configured(requested) {
                return requested;
            }
            PRIORITY
                .iter()
                .position(|kind| *kind == requested)
                .map(|index| index + 1)
                .unwrap_or(0)
        }
    };

    for kind in &PRIORITY[start.min(PRIORITY.len() - 1)..] {
        if config.is_configured(*kind) {
            return *kind;
        }
    }

    ProviderKind::Ollama
}

/// Builds the adapter for an already-resolved provider.
pub fn build_model(
    kind: ProviderKind,
    model_name: Option<&str>,
    config: &ProviderConfig,
) -> Result<Box<dyn GenerativeModel>, ProviderError> {
    match kind {
        ProviderKind::Gemini => {
            let api_key =
                config
                    .gemini_api_key
                    .clone()
                    .ok_or_else(|| ProviderError::NotConfigured {
                        provider: "gemini".to_string(),
                        details: "GEMINI_API_KEY is not set".to_string(),
                    })?;
            Ok(Box::new(GeminiModel::new(api_key, model_name)?))
        }
        ProviderKind::Mistral => {
            let api_key =
                config
                    .mistral_api_key
                    .clone()
                    .ok_or_else(|| ProviderError::NotConfigured {
                        provider: "mistral".to_string(),
                        details: "MISTRAL_API_KEY is not set".to_string(),
                    })?;
            Ok(Box::new(MistralModel::new(api_key, model_name)?))
        }
        ProviderKind::Ollama => Ok(Box::new(OllamaModel::new(
            config.ollama_url.clone(),
            model_name.unwrap_or(&config.ollama_model),
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(gemini: bool, mistral: bool) -> ProviderConfig {
        ProviderConfig {
            gemini_api_key: gemini.then(|| "gk".to_string()),
            mistral_api_key: mistral.then(|| "mk".to_string()),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2:1b".to_string(),
        }
    }

    #[test]
    fn auto_prefers_gemini_then_mistral_then_ollama() {
        assert_eq!(
            resolve_provider(ProviderChoice::Auto, &config(true, true)),
            ProviderKind::Gemini
        );
        assert_eq!(
            resolve_provider(ProviderChoice::Auto, &config(false, true)),
            ProviderKind::Mistral
        );
        assert_eq!(
            resolve_provider(ProviderChoice::Auto, &config(false, false)),
            ProviderKind::Ollama
        );
    }

    #[test]
    fn explicit_configured_provider_is_honored() {
        assert_eq!(
            resolve_provider(
                ProviderChoice::Explicit(ProviderKind::Mistral),
                &config(true, true)
            ),
            ProviderKind::Mistral
        );
    }

    #[test]
    fn explicit_unconfigured_provider_degrades_down_the_chain() {
        // Gemini requested without credentials: fall to Mistral, then Ollama.
        assert_eq!(
            resolve_provider(
                ProviderChoice::Explicit(ProviderKind::Gemini),
                &config(false, true)
            ),
            ProviderKind::Mistral
        );
        assert_eq!(
            resolve_provider(
                ProviderChoice::Explicit(ProviderKind::Gemini),
                &config(false, false)
            ),
            ProviderKind::Ollama
        );
        // Mistral requested without credentials never climbs back to Gemini.
        assert_eq!(
            resolve_provider(
                ProviderChoice::Explicit(ProviderKind::Mistral),
                &config(true, false)
            ),
            ProviderKind::Ollama
        );
    }

    #[test]
    fn ollama_is_always_available() {
        assert_eq!(
            resolve_provider(
                ProviderChoice::Explicit(ProviderKind::Ollama),
                &config(true, true)
            ),
            ProviderKind::Ollama
        );
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!(ProviderChoice::parse("AUTO"), Some(ProviderChoice::Auto));
        assert_eq!(
            ProviderChoice::parse("gemini"),
            Some(ProviderChoice::Explicit(ProviderKind::Gemini))
        );
        assert_eq!(ProviderChoice::parse("claude"), None);
    }
}
