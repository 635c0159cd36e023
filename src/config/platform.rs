use secrecy::SecretString;

use crate::config::helpers::optional_env;
use crate::error::ConfigError;

pub const DEFAULT_X_API_BASE_URL: &str = "https://api.twitter.com/2";

/// Social platform API configuration.
///
/// The access token is an OAuth 2.0 user-context bearer token obtained
/// out of band; this crate never runs the authorization flow itself.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub base_url: String,
    pub access_token: Option<SecretString>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_X_API_BASE_URL.to_string(),
            access_token: None,
        }
    }
}

impl PlatformConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: optional_env("X_API_BASE_URL")?
                .unwrap_or_else(|| DEFAULT_X_API_BASE_URL.to_string()),
            access_token: optional_env("X_ACCESS_TOKEN")?.map(SecretString::from),
        })
    }
}
