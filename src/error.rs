//! Error types for personabot.

use std::time::Duration;

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Safety error: {0}")]
    Safety(#[from] SafetyError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("LibSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Social platform errors.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Platform {platform} request failed: {reason}")]
    RequestFailed { platform: String, reason: String },

    #[error("Platform {platform} rate limited, retry after {retry_after:?}")]
    RateLimited {
        platform: String,
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed for platform {platform}")]
    AuthFailed { platform: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Invalid response from {platform}: {reason}")]
    InvalidResponse { platform: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Content safety errors.
#[derive(Debug, thiserror::Error)]
pub enum SafetyError {
    #[error("Blocked content pattern detected: {pattern}")]
    BlockedContent { pattern: String },

    #[error("Output exceeded maximum length: {length} > {max}")]
    OutputTooLarge { length: usize, max: usize },
}

/// Personality profiling errors.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("No collected data to analyze")]
    NoData,

    #[error("Unknown personality dimension: {0}")]
    UnknownDimension(String),

    #[error("Could not parse analysis: {reason}")]
    Unparseable { reason: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Reply generation errors.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM returned empty content")]
    Empty,

    #[error("Generated reply rejected: {0}")]
    Unsafe(#[from] SafetyError),
}

impl LlmError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::RequestFailed { .. } | LlmError::Http(_)
        )
    }

    /// Server-suggested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl PlatformError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::RateLimited { .. }
                | PlatformError::RequestFailed { .. }
                | PlatformError::Http(_)
        )
    }

    /// Server-suggested delay before retrying, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PlatformError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
