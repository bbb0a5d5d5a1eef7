//! Completion service integration.
//!
//! Supports:
//! - **Gemini**: `generateContent` with an API key header
//! - **OpenAI**: chat completions with a bearer token (any compatible endpoint)
//!
//! Both speak plain HTTP through `reqwest` and are consumed through the
//! `CompletionClient` trait.

pub mod gemini;
pub mod openai;
pub mod provider;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use provider::CompletionClient;

use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;

/// Supported completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Gemini,
    OpenAi,
}

impl LlmBackend {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => gemini::DEFAULT_MODEL,
            Self::OpenAi => openai::DEFAULT_MODEL,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => gemini::DEFAULT_BASE_URL,
            Self::OpenAi => openai::DEFAULT_BASE_URL,
        }
    }
}

impl std::fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" | "open_ai" => Ok(Self::OpenAi),
            _ => Err(format!("Unknown LLM backend: {}", s)),
        }
    }
}

/// Configuration for creating a completion client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Overrides the backend's public endpoint (proxies, tests).
    pub base_url: Option<String>,
    /// Transport-level timeout for a single HTTP request.
    pub request_timeout: Duration,
}

/// Create a completion client from configuration.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>, LlmError> {
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: config.backend.to_string(),
            reason: format!("Failed to build HTTP client: {}", e),
        })?;

    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| config.backend.default_base_url().to_string());

    tracing::info!(backend = %config.backend, model = %config.model, "Using completion backend");

    Ok(match config.backend {
        LlmBackend::Gemini => Arc::new(GeminiClient::new(
            http,
            config.api_key.clone(),
            &config.model,
            base_url,
        )),
        LlmBackend::OpenAi => Arc::new(OpenAiClient::new(
            http,
            config.api_key.clone(),
            &config.model,
            base_url,
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config(backend: LlmBackend) -> LlmConfig {
        LlmConfig {
            backend,
            api_key: SecretString::from("test-key"),
            model: backend.default_model().to_string(),
            base_url: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn create_gemini_client() {
        let client = create_client(&config(LlmBackend::Gemini)).unwrap();
        assert_eq!(client.provider_name(), "gemini");
        assert_eq!(client.model_name(), "gemini-1.5-flash");
    }

    #[test]
    fn create_openai_client() {
        let client = create_client(&config(LlmBackend::OpenAi)).unwrap();
        assert_eq!(client.provider_name(), "openai");
    }

    #[test]
    fn backend_from_str() {
        assert_eq!("Gemini".parse::<LlmBackend>(), Ok(LlmBackend::Gemini));
        assert_eq!("openai".parse::<LlmBackend>(), Ok(LlmBackend::OpenAi));
        assert!("anthropic".parse::<LlmBackend>().is_err());
    }
}
