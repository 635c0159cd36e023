//! Configuration for personabot.
//!
//! Resolution order for every option: environment variable, then the TOML
//! settings file ([`crate::settings`]), then the built-in default. A `.env`
//! file in the working directory is loaded first.

mod database;
pub(crate) mod helpers;
mod llm;
mod platform;

use std::path::PathBuf;
use std::time::Duration;

pub use database::{DEFAULT_LIBSQL_PATH, DatabaseConfig};
pub use llm::{DEFAULT_LLM_BASE_URL, LlmConfig};
pub use platform::{DEFAULT_X_API_BASE_URL, PlatformConfig};

use crate::config::helpers::{
    check_finite, check_unit_interval, optional_env, parse_bool_env, parse_optional_env,
};
use crate::decision::Thresholds;
use crate::decision::scorer::{Keywords, ScoringConfig, ScoringWeights};
use crate::error::ConfigError;
use crate::generator::GenerationSettings;
use crate::ratelimit::ActionQuota;
use crate::safety::SafetyConfig;
use crate::settings::{DEFAULT_SETTINGS_FILE, Settings};

/// Main configuration for the agent.
#[derive(Debug, Clone)]
pub struct Config {
    /// Account the agent acts as, without the leading `@`.
    pub bot_username: String,
    pub llm: LlmConfig,
    pub platform: PlatformConfig,
    pub database: DatabaseConfig,
    pub content: ContentConfig,
    pub thresholds: Thresholds,
    pub quota: ActionQuota,
    pub generation: GenerationSettings,
    pub agent: AgentConfig,
}

/// What to engage with and what to stay away from.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub preferred_topics: Vec<String>,
    pub avoided_topics: Vec<String>,
    pub blocked_terms: Vec<String>,
    pub keywords: Keywords,
    pub weights: ScoringWeights,
    /// Ignore posts that mention an avoided topic.
    pub avoid_controversial: bool,
    /// Apply blocked-term filtering to incoming posts and replies.
    pub safe_mode: bool,
}

/// Run-loop behavior.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Decide and generate but never write to the platform.
    pub dry_run: bool,
    /// Poll far less often to save API quota.
    pub lite_mode: bool,
    pub timeline_interval: Duration,
    pub mentions_interval: Duration,
    /// Number of own posts collected for profiling.
    pub post_window: usize,
    /// Days of processed-post markers and interaction log kept.
    pub retention_days: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            lite_mode: false,
            timeline_interval: Duration::from_secs(15 * 60),
            mentions_interval: Duration::from_secs(5 * 60),
            post_window: 1000,
            retention_days: 90,
        }
    }
}

/// Lite mode polls at most every four hours, and never more often than four
/// times the configured interval.
const LITE_MODE_FLOOR: Duration = Duration::from_secs(240 * 60);
/// Longest accepted polling interval: one week.
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
/// Longest accepted retention: one hundred years.
const MAX_RETENTION_DAYS: u32 = 36_500;

impl AgentConfig {
    /// Interval actually used by the run loop, after lite-mode scaling.
    pub fn effective_interval(&self, base: Duration) -> Duration {
        if self.lite_mode {
            base.saturating_mul(4).max(LITE_MODE_FLOOR)
        } else {
            base
        }
    }
}

impl Config {
    /// Load configuration from the environment and the settings file.
    ///
    /// The settings file path comes from `PERSONABOT_CONFIG`, falling back to
    /// `personabot.toml` in the working directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let path = optional_env("PERSONABOT_CONFIG")?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        let settings = Settings::load_from(&path)?;
        Self::resolve(&settings)
    }

    /// Build the configuration from already-loaded settings plus env vars.
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let bot_username = optional_env("BOT_USERNAME")?
            .or_else(|| settings.bot_username.clone())
            .unwrap_or_default()
            .trim_start_matches('@')
            .to_string();

        Ok(Self {
            bot_username,
            llm: LlmConfig::resolve(settings)?,
            platform: PlatformConfig::resolve()?,
            database: DatabaseConfig::resolve(settings)?,
            content: resolve_content(settings)?,
            thresholds: resolve_thresholds(settings)?,
            quota: resolve_quota()?,
            generation: resolve_generation()?,
            agent: resolve_agent(settings)?,
        })
    }

    /// Check that everything needed to talk to the platform and the model
    /// is present. Offline commands skip this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_username.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "BOT_USERNAME".to_string(),
                hint: "Set BOT_USERNAME or bot_username in the settings file".to_string(),
            });
        }
        if self.platform.access_token.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "X_ACCESS_TOKEN".to_string(),
                hint: "Set X_ACCESS_TOKEN to an OAuth 2.0 user access token".to_string(),
            });
        }
        if self.llm.api_key.is_none() && self.llm.uses_default_endpoint() {
            return Err(ConfigError::MissingRequired {
                key: "LLM_API_KEY".to_string(),
                hint: "Set LLM_API_KEY, or point LLM_BASE_URL at a local server".to_string(),
            });
        }
        Ok(())
    }

    /// Compile the scorer's keyword matchers and weights.
    pub fn scoring_config(&self) -> Result<ScoringConfig, ConfigError> {
        ScoringConfig::new(
            &self.content.keywords,
            &self.content.preferred_topics,
            &self.content.avoided_topics,
            self.content.weights,
        )
    }

    pub fn safety_config(&self) -> SafetyConfig {
        SafetyConfig {
            safe_mode: self.content.safe_mode,
            blocked_terms: self.content.blocked_terms.clone(),
            avoided_topics: self.content.avoided_topics.clone(),
        }
    }
}

fn resolve_content(settings: &Settings) -> Result<ContentConfig, ConfigError> {
    let mut weights = ScoringWeights::default();
    if let Some(overrides) = &settings.weights {
        if let Some(o) = &overrides.like {
            weights.like = o.apply_to(weights.like);
        }
        if let Some(o) = &overrides.reply {
            weights.reply = o.apply_to(weights.reply);
        }
        if let Some(o) = &overrides.repost {
            weights.repost = o.apply_to(weights.repost);
        }
    }
    for (action, table) in [
        ("like", &weights.like),
        ("reply", &weights.reply),
        ("repost", &weights.repost),
    ] {
        for (name, value) in table.entries() {
            check_finite(&format!("weights.{action}.{name}"), value)?;
        }
    }

    Ok(ContentConfig {
        preferred_topics: settings.content.preferred_topics.clone(),
        avoided_topics: settings.content.avoided_topics.clone(),
        blocked_terms: settings.content.blocked_terms.clone(),
        keywords: settings.keywords.clone().unwrap_or_default(),
        weights,
        avoid_controversial: parse_bool_env("AVOID_CONTROVERSIAL_TOPICS", true)?,
        safe_mode: parse_bool_env("SAFE_MODE", true)?,
    })
}

fn resolve_thresholds(settings: &Settings) -> Result<Thresholds, ConfigError> {
    let defaults = Thresholds::default();
    let t = &settings.thresholds;

    let min_engagement = match optional_env("MIN_ENGAGEMENT_SCORE")? {
        Some(_) => parse_optional_env("MIN_ENGAGEMENT_SCORE", defaults.min_engagement)?,
        None => t.min_engagement.unwrap_or(defaults.min_engagement),
    };

    Ok(Thresholds {
        like: check_unit_interval("thresholds.like", t.like.unwrap_or(defaults.like))?,
        reply: check_unit_interval("thresholds.reply", t.reply.unwrap_or(defaults.reply))?,
        repost: check_unit_interval("thresholds.repost", t.repost.unwrap_or(defaults.repost))?,
        min_engagement: check_unit_interval("MIN_ENGAGEMENT_SCORE", min_engagement)?,
    })
}

fn resolve_quota() -> Result<ActionQuota, ConfigError> {
    let defaults = ActionQuota::default();
    Ok(ActionQuota {
        likes_per_hour: parse_optional_env("MAX_LIKES_PER_HOUR", defaults.likes_per_hour)?,
        replies_per_hour: parse_optional_env("MAX_REPLIES_PER_HOUR", defaults.replies_per_hour)?,
        reposts_per_hour: parse_optional_env("MAX_REPOSTS_PER_HOUR", defaults.reposts_per_hour)?,
    })
}

fn resolve_generation() -> Result<GenerationSettings, ConfigError> {
    let defaults = GenerationSettings::default();
    let temperature: f32 = parse_optional_env("RESPONSE_TEMPERATURE", defaults.temperature)?;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::InvalidValue {
            key: "RESPONSE_TEMPERATURE".to_string(),
            message: format!("must be between 0.0 and 2.0, got {temperature}"),
        });
    }
    let max_chars: usize = parse_optional_env("MAX_REPLY_CHARS", defaults.max_chars)?;
    if max_chars == 0 {
        return Err(ConfigError::InvalidValue {
            key: "MAX_REPLY_CHARS".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(GenerationSettings {
        temperature,
        max_tokens: parse_optional_env("MAX_RESPONSE_TOKENS", defaults.max_tokens)?,
        max_chars,
    })
}

fn resolve_agent(settings: &Settings) -> Result<AgentConfig, ConfigError> {
    let defaults = AgentConfig::default();
    let minutes = |key: &str,
                   from_settings: Option<u64>,
                   default: Duration|
     -> Result<Duration, ConfigError> {
        let fallback = from_settings.unwrap_or(default.as_secs() / 60);
        let value: u64 = parse_optional_env(key, fallback)?;
        if !(1..=MAX_INTERVAL_MINUTES).contains(&value) {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!(
                    "must be between 1 and {MAX_INTERVAL_MINUTES} minutes, got {value}"
                ),
            });
        }
        Ok(Duration::from_secs(value * 60))
    };

    let retention_days: u32 = parse_optional_env("RETENTION_DAYS", defaults.retention_days)?;
    if retention_days > MAX_RETENTION_DAYS {
        return Err(ConfigError::InvalidValue {
            key: "RETENTION_DAYS".to_string(),
            message: format!("must be at most {MAX_RETENTION_DAYS}, got {retention_days}"),
        });
    }

    Ok(AgentConfig {
        dry_run: parse_bool_env("DRY_RUN", defaults.dry_run)?,
        lite_mode: parse_bool_env("LITE_MODE", defaults.lite_mode)?,
        timeline_interval: minutes(
            "TIMELINE_INTERVAL_MINUTES",
            settings.schedule.timeline_interval_minutes,
            defaults.timeline_interval,
        )?,
        mentions_interval: minutes(
            "MENTIONS_INTERVAL_MINUTES",
            settings.schedule.mentions_interval_minutes,
            defaults.mentions_interval,
        )?,
        post_window: parse_optional_env("POST_WINDOW", defaults.post_window)?,
        retention_days,
    })
}
