//! Personality profile types.
//!
//! A profile is a small fixed vector of scalar dimensions derived from the
//! user's own posts and likes. Scores and confidences are always kept in
//! `[0.0, 1.0]`: constructors clamp, and deserialization clamps (non-numeric
//! or non-finite values fall back to the neutral 0.5).
//!
//! The profile is persisted as the single active row set in the
//! `personality_profile` table and read back by the decision engine and the
//! reply generator.

pub mod stats;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProfileError;

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// One personality dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    HumorLevel,
    Formality,
    Enthusiasm,
    TechnicalDepth,
    ControversyTolerance,
    EmojiUsage,
    HashtagUsage,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::HumorLevel,
        Dimension::Formality,
        Dimension::Enthusiasm,
        Dimension::TechnicalDepth,
        Dimension::ControversyTolerance,
        Dimension::EmojiUsage,
        Dimension::HashtagUsage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::HumorLevel => "humor_level",
            Dimension::Formality => "formality",
            Dimension::Enthusiasm => "enthusiasm",
            Dimension::TechnicalDepth => "technical_depth",
            Dimension::ControversyTolerance => "controversy_tolerance",
            Dimension::EmojiUsage => "emoji_usage",
            Dimension::HashtagUsage => "hashtag_usage",
        }
    }

    /// Short description used in the analysis prompt.
    pub fn description(&self) -> &'static str {
        match self {
            Dimension::HumorLevel => "How humorous/funny they are",
            Dimension::Formality => "How formal vs casual their communication is",
            Dimension::Enthusiasm => "How enthusiastic/energetic they are",
            Dimension::TechnicalDepth => "How technical/detailed their content is",
            Dimension::ControversyTolerance => {
                "How willing they are to engage with controversial topics"
            }
            Dimension::EmojiUsage => "How frequently they use emojis",
            Dimension::HashtagUsage => "How frequently they use hashtags",
        }
    }

    /// Score assumed when nothing is known about the user.
    pub fn neutral_score(&self) -> f64 {
        match self {
            Dimension::ControversyTolerance => 0.3,
            _ => 0.5,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Dimension {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == normalized)
            .or(match normalized.as_str() {
                "humor" => Some(Dimension::HumorLevel),
                "technical" => Some(Dimension::TechnicalDepth),
                "controversy" => Some(Dimension::ControversyTolerance),
                _ => None,
            })
            .ok_or_else(|| ProfileError::UnknownDimension(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// A dimension score with the analyst's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    #[serde(deserialize_with = "deserialize_unit_score")]
    pub score: f64,
    #[serde(default = "default_confidence", deserialize_with = "deserialize_unit_score")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

impl DimensionScore {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            score: clamp_unit(score),
            confidence: clamp_unit(confidence),
        }
    }
}

/// Clamp to `[0, 1]`; non-finite values become the neutral 0.5.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Other(serde::de::IgnoredAny),
}

/// Deserialize a score, clamping to the 0-1 range.
///
/// Accepts integer or floating-point JSON numbers. Values outside 0-1 are
/// clamped. Non-numeric values fall back to 0.5.
fn deserialize_unit_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawScore::deserialize(deserializer)? {
        RawScore::Number(n) => clamp_unit(n),
        RawScore::Other(_) => 0.5,
    })
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// How a profile was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSource {
    /// Statistical features blended with a language-model judgment.
    Blended,
    /// Statistical features only (model unavailable or unparseable).
    StatisticalOnly,
    /// Built-in neutral defaults.
    Neutral,
}

impl ProfileSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileSource::Blended => "blended",
            ProfileSource::StatisticalOnly => "statistical_only",
            ProfileSource::Neutral => "neutral",
        }
    }
}

impl std::str::FromStr for ProfileSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blended" => Ok(Self::Blended),
            "statistical_only" => Ok(Self::StatisticalOnly),
            "neutral" => Ok(Self::Neutral),
            other => Err(format!("unknown profile source '{other}'")),
        }
    }
}

/// The active personality profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    pub dimensions: BTreeMap<Dimension, DimensionScore>,
    pub source: ProfileSource,
    /// Number of records the profile was derived from.
    pub sample_size: usize,
    pub created_at: DateTime<Utc>,
}

impl PersonalityProfile {
    /// Neutral profile used before any analysis has run.
    pub fn neutral() -> Self {
        Self {
            dimensions: Dimension::ALL
                .into_iter()
                .map(|d| (d, DimensionScore::new(d.neutral_score(), 0.0)))
                .collect(),
            source: ProfileSource::Neutral,
            sample_size: 0,
            created_at: Utc::now(),
        }
    }

    /// Score for a dimension, falling back to the neutral value.
    pub fn get(&self, dimension: Dimension) -> DimensionScore {
        self.dimensions
            .get(&dimension)
            .copied()
            .unwrap_or_else(|| DimensionScore::new(dimension.neutral_score(), 0.0))
    }

    pub fn score(&self, dimension: Dimension) -> f64 {
        self.get(dimension).score
    }

    /// Insert a score; values are clamped.
    pub fn set(&mut self, dimension: Dimension, score: f64, confidence: f64) {
        self.dimensions
            .insert(dimension, DimensionScore::new(score, confidence));
    }

    /// Mean confidence across all seven dimensions (missing ones count as 0).
    pub fn mean_confidence(&self) -> f64 {
        let total: f64 = Dimension::ALL.iter().map(|d| self.get(*d).confidence).sum();
        clamp_unit(total / Dimension::ALL.len() as f64)
    }

    /// Render as a short human-readable table.
    pub fn render(&self) -> String {
        let mut out = format!(
            "Personality profile ({}, {} records, {})\n",
            self.source.as_str(),
            self.sample_size,
            self.created_at.format("%Y-%m-%d %H:%M UTC")
        );
        for dimension in Dimension::ALL {
            let s = self.get(dimension);
            out.push_str(&format!(
                "  {:<22} {:>4.2}  (confidence {:.2})\n",
                dimension.as_str(),
                s.score,
                s.confidence
            ));
        }
        out
    }
}
