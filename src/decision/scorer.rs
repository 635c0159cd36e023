//! Weighted engagement scorer.
//!
//! Scores a candidate post against the active personality profile on a set of
//! independent criteria, each in `[0, 1]`, then folds them into one score per
//! action with a per-action weight table. Penalties subtract. Every action
//! score is clamped to `[0, 1]`.
//!
//! Nothing in here knows about thresholds; the engine compares these scores
//! against thresholds afterwards, which is what keeps threshold changes
//! monotonic.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::decision::Action;
use crate::error::ConfigError;
use crate::platform::types::Post;
use crate::profile::{Dimension, PersonalityProfile, clamp_unit};

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// Keyword vocabularies for the text criteria.
///
/// Matching is case-insensitive on word starts, so `tech` also hits
/// `technology`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keywords {
    pub humor: Vec<String>,
    pub technical: Vec<String>,
    pub positive: Vec<String>,
    pub value: Vec<String>,
    pub controversy: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for Keywords {
    fn default() -> Self {
        Self {
            humor: words(&["funny", "lol", "joke", "humor", "haha", "lmao", "meme"]),
            technical: words(&[
                "tech",
                "programming",
                "code",
                "software",
                "rust",
                "compiler",
                "database",
                "algorithm",
                "api",
            ]),
            positive: words(&[
                "thank",
                "awesome",
                "great",
                "excellent",
                "amazing",
                "love",
                "brilliant",
            ]),
            value: words(&[
                "tutorial",
                "guide",
                "tip",
                "resource",
                "useful",
                "important",
                "how to",
            ]),
            controversy: words(&[
                "politic",
                "election",
                "abortion",
                "religion",
                "vaccine",
                "immigration",
                "scandal",
                "outrage",
            ]),
        }
    }
}

/// Compiled case-insensitive word-start matcher over a keyword list.
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    re: Option<Regex>,
}

impl KeywordMatcher {
    /// Compile `words` into one alternation. An empty list never matches.
    pub fn new(key: &str, words: &[String]) -> Result<Self, ConfigError> {
        let alternatives: Vec<String> = words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { re: None });
        }
        let pattern = format!(r"(?i)\b(?:{})\w*", alternatives.join("|"));
        let re = Regex::new(&pattern).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { re: Some(re) })
    }

    /// Number of keyword hits in `text`.
    pub fn hits(&self, text: &str) -> usize {
        self.re.as_ref().map_or(0, |re| re.find_iter(text).count())
    }

    /// Number of hits across the text and any platform topic labels.
    pub fn hits_with_topics(&self, text: &str, topics: &[String]) -> usize {
        self.hits(text) + topics.iter().map(|t| self.hits(t)).sum::<usize>()
    }
}

/// Saturating signal for keyword hits: one hit is a clear signal, each extra
/// hit adds a little, capped at 1.
pub fn keyword_signal(hits: usize) -> f64 {
    if hits == 0 {
        0.0
    } else {
        (0.6 + 0.2 * (hits - 1) as f64).min(1.0)
    }
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Weight table for one action. Penalty weights are subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ActionWeights {
    pub question: f64,
    pub humor: f64,
    pub technical: f64,
    pub positivity: f64,
    pub value: f64,
    pub engagement: f64,
    pub influence: f64,
    pub topic: f64,
    pub avoided: f64,
    pub controversy: f64,
    pub repost: f64,
}

impl ActionWeights {
    /// Every weight with its settings-file key.
    pub fn entries(&self) -> [(&'static str, f64); 11] {
        [
            ("question", self.question),
            ("humor", self.humor),
            ("technical", self.technical),
            ("positivity", self.positivity),
            ("value", self.value),
            ("engagement", self.engagement),
            ("influence", self.influence),
            ("topic", self.topic),
            ("avoided", self.avoided),
            ("controversy", self.controversy),
            ("repost", self.repost),
        ]
    }

    pub fn like() -> Self {
        Self {
            question: 0.0,
            humor: 0.3,
            technical: 0.3,
            positivity: 0.9,
            value: 0.3,
            engagement: 0.6,
            influence: 0.2,
            topic: 0.4,
            avoided: 1.0,
            controversy: 0.5,
            repost: 0.0,
        }
    }

    pub fn reply() -> Self {
        Self {
            question: 0.6,
            humor: 1.2,
            technical: 1.4,
            positivity: 0.1,
            value: 0.1,
            engagement: 0.1,
            influence: 0.1,
            topic: 0.3,
            avoided: 1.0,
            controversy: 0.6,
            repost: 0.3,
        }
    }

    pub fn repost() -> Self {
        Self {
            question: 0.0,
            humor: 0.1,
            technical: 0.2,
            positivity: 0.1,
            value: 1.0,
            engagement: 0.3,
            influence: 0.6,
            topic: 0.3,
            avoided: 1.0,
            controversy: 0.8,
            repost: 1.0,
        }
    }
}

/// Partial weight table from the settings file; unset fields keep the
/// action's built-in weight.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeightOverrides {
    pub question: Option<f64>,
    pub humor: Option<f64>,
    pub technical: Option<f64>,
    pub positivity: Option<f64>,
    pub value: Option<f64>,
    pub engagement: Option<f64>,
    pub influence: Option<f64>,
    pub topic: Option<f64>,
    pub avoided: Option<f64>,
    pub controversy: Option<f64>,
    pub repost: Option<f64>,
}

impl WeightOverrides {
    pub fn apply_to(&self, base: ActionWeights) -> ActionWeights {
        ActionWeights {
            question: self.question.unwrap_or(base.question),
            humor: self.humor.unwrap_or(base.humor),
            technical: self.technical.unwrap_or(base.technical),
            positivity: self.positivity.unwrap_or(base.positivity),
            value: self.value.unwrap_or(base.value),
            engagement: self.engagement.unwrap_or(base.engagement),
            influence: self.influence.unwrap_or(base.influence),
            topic: self.topic.unwrap_or(base.topic),
            avoided: self.avoided.unwrap_or(base.avoided),
            controversy: self.controversy.unwrap_or(base.controversy),
            repost: self.repost.unwrap_or(base.repost),
        }
    }
}

/// Per-action weight tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringWeights {
    pub like: ActionWeights,
    pub reply: ActionWeights,
    pub repost: ActionWeights,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            like: ActionWeights::like(),
            reply: ActionWeights::reply(),
            repost: ActionWeights::repost(),
        }
    }
}

impl ScoringWeights {
    pub fn for_action(&self, action: Action) -> &ActionWeights {
        match action {
            Action::Like => &self.like,
            Action::Reply => &self.reply,
            Action::Repost => &self.repost,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Compiled scorer configuration.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub humor: KeywordMatcher,
    pub technical: KeywordMatcher,
    pub positive: KeywordMatcher,
    pub value: KeywordMatcher,
    pub controversy: KeywordMatcher,
    pub preferred_topics: KeywordMatcher,
    pub avoided_topics: KeywordMatcher,
    pub weights: ScoringWeights,
}

impl ScoringConfig {
    pub fn new(
        keywords: &Keywords,
        preferred_topics: &[String],
        avoided_topics: &[String],
        weights: ScoringWeights,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            humor: KeywordMatcher::new("keywords.humor", &keywords.humor)?,
            technical: KeywordMatcher::new("keywords.technical", &keywords.technical)?,
            positive: KeywordMatcher::new("keywords.positive", &keywords.positive)?,
            value: KeywordMatcher::new("keywords.value", &keywords.value)?,
            controversy: KeywordMatcher::new("keywords.controversy", &keywords.controversy)?,
            preferred_topics: KeywordMatcher::new("content.preferred_topics", preferred_topics)?,
            avoided_topics: KeywordMatcher::new("content.avoided_topics", avoided_topics)?,
            weights,
        })
    }

    /// Built-in vocabularies and weights, no topic lists.
    pub fn with_defaults() -> Result<Self, ConfigError> {
        Self::new(&Keywords::default(), &[], &[], ScoringWeights::default())
    }
}

// ---------------------------------------------------------------------------
// Breakdown
// ---------------------------------------------------------------------------

/// Positive criteria, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Components {
    pub question: f64,
    pub humor_match: f64,
    pub technical_match: f64,
    pub positivity: f64,
    pub value: f64,
    pub engagement: f64,
    pub author_influence: f64,
    pub topic_affinity: f64,
}

/// Penalty criteria, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Penalties {
    pub avoided_topic: f64,
    pub controversy: f64,
    pub is_repost: f64,
}

/// Full scoring result for one post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub components: Components,
    pub penalties: Penalties,
    /// Per-action score in `[0, 1]`.
    pub action_scores: BTreeMap<Action, f64>,
    /// Highest of the per-action scores.
    pub engagement_score: f64,
    /// Human-readable notes on what drove the score.
    pub hints: Vec<String>,
}

impl ScoreBreakdown {
    pub fn action_score(&self, action: Action) -> f64 {
        self.action_scores.get(&action).copied().unwrap_or(0.0)
    }
}

/// Like count / repost count curve: mid-range posts with some reposts are
/// the sweet spot, viral posts less so.
fn engagement_component(likes: u64, reposts: u64) -> f64 {
    match likes {
        10..=1000 if reposts > 5 => 1.0,
        10..=1000 => 0.6,
        n if n > 1000 => 0.3,
        _ => 0.0,
    }
}

fn influence_component(followers: Option<u64>) -> f64 {
    match followers {
        Some(n) if n > 10_000 => 1.0,
        Some(n) if n > 1_000 => 0.5,
        _ => 0.0,
    }
}

fn weighted(c: &Components, p: &Penalties, w: &ActionWeights) -> f64 {
    let gain = w.question * c.question
        + w.humor * c.humor_match
        + w.technical * c.technical_match
        + w.positivity * c.positivity
        + w.value * c.value
        + w.engagement * c.engagement
        + w.influence * c.author_influence
        + w.topic * c.topic_affinity;
    let loss = w.avoided * p.avoided_topic + w.controversy * p.controversy + w.repost * p.is_repost;
    let raw = gain - loss;
    // A NaN here would clamp to the neutral 0.5 and pass default thresholds.
    if raw.is_nan() { 0.0 } else { clamp_unit(raw) }
}

/// Score a post for every action.
pub fn score_post(
    post: &Post,
    profile: &PersonalityProfile,
    config: &ScoringConfig,
) -> ScoreBreakdown {
    let text = post.text.as_str();
    let mut hints = Vec::new();

    let humor_signal = keyword_signal(config.humor.hits(text));
    let technical_signal = keyword_signal(config.technical.hits(text));
    let controversy_signal = keyword_signal(config.controversy.hits(text));

    let components = Components {
        question: if text.contains('?') { 1.0 } else { 0.0 },
        humor_match: clamp_unit(humor_signal * profile.score(Dimension::HumorLevel)),
        technical_match: clamp_unit(technical_signal * profile.score(Dimension::TechnicalDepth)),
        positivity: keyword_signal(config.positive.hits(text)),
        value: keyword_signal(config.value.hits(text)),
        engagement: engagement_component(post.metrics.like_count, post.metrics.repost_count),
        author_influence: influence_component(post.author.followers_count),
        topic_affinity: keyword_signal(config.preferred_topics.hits_with_topics(text, &post.topics)),
    };
    let penalties = Penalties {
        avoided_topic: keyword_signal(config.avoided_topics.hits_with_topics(text, &post.topics)),
        controversy: clamp_unit(
            controversy_signal * (1.0 - profile.score(Dimension::ControversyTolerance)),
        ),
        is_repost: if post.is_repost() { 1.0 } else { 0.0 },
    };

    if components.question > 0.0 {
        hints.push("asks a question".to_string());
    }
    if components.humor_match > 0.0 {
        hints.push(format!("humor match {:.2}", components.humor_match));
    }
    if components.technical_match > 0.0 {
        hints.push(format!("technical match {:.2}", components.technical_match));
    }
    if components.positivity > 0.0 {
        hints.push("positive tone".to_string());
    }
    if components.value > 0.0 {
        hints.push("useful content".to_string());
    }
    if components.engagement >= 1.0 {
        hints.push("healthy engagement".to_string());
    }
    if components.author_influence >= 1.0 {
        hints.push("influential author".to_string());
    }
    if components.topic_affinity > 0.0 {
        hints.push("preferred topic".to_string());
    }
    if penalties.avoided_topic > 0.0 {
        hints.push("touches an avoided topic".to_string());
    }
    if penalties.controversy > 0.0 {
        hints.push(format!("controversy penalty {:.2}", penalties.controversy));
    }
    if penalties.is_repost > 0.0 {
        hints.push("is a repost".to_string());
    }

    let action_scores: BTreeMap<Action, f64> = Action::ALL
        .into_iter()
        .map(|a| (a, weighted(&components, &penalties, config.weights.for_action(a))))
        .collect();
    let engagement_score = action_scores.values().copied().fold(0.0, f64::max);

    ScoreBreakdown {
        components,
        penalties,
        action_scores,
        engagement_score,
        hints,
    }
}
