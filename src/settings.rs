//! Optional TOML settings file.
//!
//! Holds the list-valued and tuning options that are awkward to express as
//! env vars: topic lists, keyword vocabularies, decision thresholds and
//! per-action weights. Every field is optional; env vars take priority over
//! anything set here, and built-in defaults fill the rest.
//!
//! ```toml
//! bot_username = "jane"
//!
//! [content]
//! preferred_topics = ["rust", "databases"]
//! avoided_topics = ["politics"]
//!
//! [thresholds]
//! like = 0.4
//! reply = 0.55
//! repost = 0.65
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::decision::scorer::{Keywords, WeightOverrides};
use crate::error::ConfigError;

/// Default settings file name, resolved relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "personabot.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bot_username: Option<String>,
    pub llm_model: Option<String>,
    pub libsql_path: Option<PathBuf>,
    pub content: ContentSettings,
    pub thresholds: ThresholdSettings,
    pub keywords: Option<Keywords>,
    pub weights: Option<WeightSettings>,
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    pub preferred_topics: Vec<String>,
    pub avoided_topics: Vec<String>,
    pub blocked_terms: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub like: Option<f64>,
    pub reply: Option<f64>,
    pub repost: Option<f64>,
    pub min_engagement: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WeightSettings {
    pub like: Option<WeightOverrides>,
    pub reply: Option<WeightOverrides>,
    pub repost: Option<WeightOverrides>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub timeline_interval_minutes: Option<u64>,
    pub mentions_interval_minutes: Option<u64>,
}

impl Settings {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        Self::parse(&raw)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))
    }

    /// Parse settings from TOML text.
    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}
