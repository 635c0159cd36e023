use std::time::Duration;

use secrecy::SecretString;

use crate::config::helpers::{optional_env, parse_optional_env};
use crate::error::ConfigError;
use crate::settings::Settings;

/// Default endpoint when `LLM_BASE_URL` is unset.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o";

/// Language-model endpoint configuration.
///
/// Any OpenAI-compatible Chat Completions server works (OpenAI, vLLM,
/// LiteLLM, Ollama's `/v1`). Sampling parameters for replies live in
/// [`crate::generator::GenerationSettings`].
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    /// Bearer token; local servers usually run without one.
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl LlmConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // Priority: env var > settings > default
        let model = optional_env("LLM_MODEL")?
            .or_else(|| settings.llm_model.clone())
            .unwrap_or(defaults.model);

        let timeout_secs: u64 = parse_optional_env("LLM_TIMEOUT_SECS", defaults.timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            base_url: optional_env("LLM_BASE_URL")?.unwrap_or(defaults.base_url),
            api_key: optional_env("LLM_API_KEY")?.map(SecretString::from),
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Whether requests go to the hosted default endpoint, which needs a key.
    pub fn uses_default_endpoint(&self) -> bool {
        self.base_url.trim_end_matches('/') == DEFAULT_LLM_BASE_URL
    }
}
