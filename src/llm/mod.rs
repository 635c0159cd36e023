//! LLM integration.
//!
//! One provider backend: any OpenAI-compatible Chat Completions endpoint.

mod openai_compatible;
pub mod provider;

use std::sync::Arc;

pub use openai_compatible::OpenAiCompatibleProvider;
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Create an LLM provider based on configuration.
pub fn create_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiCompatibleProvider::new(config.clone())?;
    tracing::info!(
        base_url = %config.base_url,
        model = %config.model,
        "Using OpenAI-compatible endpoint"
    );
    Ok(Arc::new(provider))
}
