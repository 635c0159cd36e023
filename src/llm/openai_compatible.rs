//! OpenAI-compatible LLM provider implementation.
//!
//! Talks to any endpoint that implements the OpenAI Chat Completions API:
//! OpenAI itself, OpenRouter, or a local server such as Ollama or LM Studio.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};
use crate::util::prefix_bytes;

/// Provider name constant to avoid magic strings.
const PROVIDER_NAME: &str = "openai_compatible";

/// OpenAI-compatible Chat Completions API provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    config: LlmConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("Failed to build reqwest client: {}", e),
            })?;
        Ok(Self { client, config })
    }

    /// Construct API URL for a given path.
    /// Strips trailing `/v1` from base_url to avoid double `/v1` issues.
    fn api_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{}/v1/{}", base, path.trim_start_matches('/'))
    }

    fn add_auth_header(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_ref() {
            Some(key) => request.header("Authorization", format!("Bearer {}", key.expose_secret())),
            None => request,
        }
    }

    async fn send_request(
        &self,
        body: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let url = self.api_url("chat/completions");
        tracing::debug!(url = %url, model = %body.model, "Sending chat completion request");

        let request = self.add_auth_header(self.client.post(&url).json(body));
        let response = request.send().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER_NAME.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let response_text = response.text().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER_NAME.to_string(),
            reason: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed {
                    provider: PROVIDER_NAME.to_string(),
                },
                429 => LlmError::RateLimited {
                    provider: PROVIDER_NAME.to_string(),
                    retry_after,
                },
                _ => LlmError::RequestFailed {
                    provider: PROVIDER_NAME.to_string(),
                    reason: format!("HTTP {}: {}", status, prefix_bytes(&response_text, 200)),
                },
            });
        }

        serde_json::from_str(&response_text).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER_NAME.to_string(),
            reason: format!(
                "JSON parse error: {}. Raw: {}",
                e,
                prefix_bytes(&response_text, 200)
            ),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: req.messages.iter().map(ChatCompletionMessage::from).collect(),
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let response = self.send_request(&request).await?;
        response.into_completion()
    }
}

// OpenAI-compatible Chat Completions API types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatMessage> for ChatCompletionMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
    #[serde(default)]
    usage: Option<ChatCompletionUsage>,
}

impl ChatCompletionResponse {
    fn into_completion(self) -> Result<CompletionResponse, LlmError> {
        let usage = self.usage.unwrap_or_default();
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: "No choices in response".to_string(),
            })?;
        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn provider_with_base_url(base_url: &str) -> OpenAiCompatibleProvider {
        let config = LlmConfig {
            base_url: base_url.to_string(),
            model: "test-model".to_string(),
            api_key: Some(SecretString::from("test-key".to_string())),
            ..LlmConfig::default()
        };
        OpenAiCompatibleProvider::new(config).unwrap()
    }

    #[test]
    fn api_url_trailing_slash() {
        let provider = provider_with_base_url("https://api.example.com/");
        assert_eq!(
            provider.api_url("chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn api_url_already_has_v1() {
        let provider = provider_with_base_url("https://openrouter.ai/api/v1");
        assert_eq!(
            provider.api_url("/chat/completions"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn message_conversion() {
        let msg: ChatCompletionMessage = (&ChatMessage::system("be brief")).into();
        assert_eq!(msg.role, "system");
        assert_eq!(msg.content, "be brief");
    }

    #[test]
    fn request_omits_unset_options() {
        let req = ChatCompletionRequest {
            model: "m".to_string(),
            messages: vec![(&ChatMessage::user("hi")).into()],
            temperature: None,
            max_tokens: Some(150),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn response_parsing() {
        let raw = r#"{
            "id": "x",
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let completion = parsed.into_completion().unwrap();
        assert_eq!(completion.content, "hello");
        assert_eq!(completion.input_tokens, 12);
        assert_eq!(completion.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn response_without_choices_is_invalid() {
        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            parsed.into_completion(),
            Err(LlmError::InvalidResponse { .. })
        ));
    }
}
