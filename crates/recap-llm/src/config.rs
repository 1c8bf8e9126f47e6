//! Text generation configuration

use std::time::Duration;

use secrecy::SecretString;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Chat-completions client configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Bearer token for the API
    pub api_key: SecretString,
    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl LlmConfig {
    /// Create a config for the OpenAI API
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: OPENAI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }

    /// Use a different API base
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.ends_with("/chat/completions") {
            tracing::warn!(
                base_url = %base_url,
                "LLM base URL should not include `/chat/completions`, it is appended automatically"
            );
        }
        self.base_url = trimmed
            .trim_end_matches("/chat/completions")
            .to_string();
        self
    }

    /// Use a different model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full chat-completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}
