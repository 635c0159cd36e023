//! Builds the personality profile from collected history.
//!
//! Statistical features are always computed. The language model adds a
//! judgment on top; the two are blended per dimension, weighted by how much
//! each side trusts its own estimate. When the model is unavailable the
//! statistical estimate is used alone.

use std::sync::Arc;

use chrono::Utc;

use crate::collector::{CollectedData, UserRecord};
use crate::db::Database;
use crate::error::{ProfileError, Result};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::profile::stats::ContentStats;
use crate::profile::{Dimension, DimensionScore, PersonalityProfile, ProfileSource};
use crate::retry::{RetryPolicy, with_backoff};
use crate::util::{extract_json_object, prefix_chars};

const SYSTEM_PROMPT: &str =
    "You are a personality analyst. Analyze the user's social media data and provide insights.";

const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 600;

const MAX_BIO_CHARS: usize = 500;
const MAX_POSTS_CHARS: usize = 2000;
const MAX_LIKES_CHARS: usize = 2000;

/// Share of the blend given to the model for most dimensions.
const LLM_WEIGHT: f64 = 0.6;
/// Share given to the model for directly countable dimensions.
const LLM_WEIGHT_COUNTABLE: f64 = 0.3;

fn llm_weight(dimension: Dimension) -> f64 {
    match dimension {
        Dimension::EmojiUsage | Dimension::HashtagUsage => LLM_WEIGHT_COUNTABLE,
        _ => LLM_WEIGHT,
    }
}

/// Blend the model's and the statistical estimate of one dimension.
///
/// Each side's base weight is scaled by its confidence. When neither side
/// is confident the base weights are used as-is.
pub fn blend(dimension: Dimension, llm: DimensionScore, stats: DimensionScore) -> DimensionScore {
    let w_llm = llm_weight(dimension);
    let w_stats = 1.0 - w_llm;

    let a = w_llm * llm.confidence;
    let b = w_stats * stats.confidence;
    let score = if a + b > f64::EPSILON {
        (a * llm.score + b * stats.score) / (a + b)
    } else {
        w_llm * llm.score + w_stats * stats.score
    };
    DimensionScore::new(score, a + b)
}

/// Parse the model's JSON reply into per-dimension scores.
///
/// Unknown keys are ignored. Values may be `{"score", "confidence"}` objects
/// or bare numbers (taken at confidence 0.5).
pub fn parse_analysis(text: &str) -> std::result::Result<Vec<(Dimension, DimensionScore)>, ProfileError> {
    let json = extract_json_object(text).ok_or_else(|| ProfileError::Unparseable {
        reason: "no JSON object in reply".to_string(),
    })?;
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json).map_err(|e| ProfileError::Unparseable {
            reason: e.to_string(),
        })?;

    let mut out = Vec::new();
    for (key, value) in map {
        let Ok(dimension) = key.parse::<Dimension>() else {
            tracing::debug!(key = %key, "Ignoring unknown key in analysis");
            continue;
        };
        let score = match value {
            serde_json::Value::Number(n) => DimensionScore::new(n.as_f64().unwrap_or(0.5), 0.5),
            other => match serde_json::from_value::<DimensionScore>(other) {
                Ok(score) => score,
                Err(e) => {
                    tracing::debug!(dimension = %dimension, error = %e, "Skipping malformed score");
                    continue;
                }
            },
        };
        out.push((dimension, score));
    }

    if out.is_empty() {
        return Err(ProfileError::Unparseable {
            reason: "no recognised dimensions".to_string(),
        });
    }
    Ok(out)
}

fn join_content<'a>(records: impl Iterator<Item = &'a UserRecord>) -> String {
    records
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Analysis prompt. Deterministic for a given input.
pub fn build_prompt(data: &CollectedData, stats: &ContentStats) -> String {
    let posts = join_content(data.posts());
    let likes = join_content(data.likes());

    let mut dimensions = String::new();
    for (i, dimension) in Dimension::ALL.iter().enumerate() {
        dimensions.push_str(&format!(
            "{}. {} - {}\n",
            i + 1,
            dimension.as_str(),
            dimension.description()
        ));
    }

    format!(
        "Analyze this user's personality based on their social media activity:\n\n\
         BIO: {bio}\n\n\
         RECENT POSTS (sample):\n{posts}\n\n\
         RECENT LIKES (sample):\n{likes}\n\n\
         MEASURED STATISTICS: {summary}\n\n\
         Rate the following personality dimensions on a scale of 0.0 to 1.0, with your \
         confidence in each rating:\n\n{dimensions}\n\
         Respond in JSON format only:\n\
         {{\n  \"humor_level\": {{\"score\": 0.7, \"confidence\": 0.8}},\n  \
         \"formality\": {{\"score\": 0.3, \"confidence\": 0.9}},\n  ...\n}}\n",
        bio = prefix_chars(&data.user.description, MAX_BIO_CHARS),
        posts = prefix_chars(&posts, MAX_POSTS_CHARS),
        likes = prefix_chars(&likes, MAX_LIKES_CHARS),
        summary = stats.summary(),
    )
}

/// Combine the statistical estimate with the model's scores.
///
/// Dimensions the model did not rate keep the statistical estimate.
pub fn combine(
    estimate: &PersonalityProfile,
    judged: &[(Dimension, DimensionScore)],
) -> PersonalityProfile {
    let mut profile = estimate.clone();
    profile.source = ProfileSource::Blended;
    for (dimension, llm) in judged {
        let blended = blend(*dimension, *llm, estimate.get(*dimension));
        profile.dimensions.insert(*dimension, blended);
    }
    profile
}

/// Produces and persists the active personality profile.
pub struct Profiler {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn Database>,
    retry: RetryPolicy,
}

impl Profiler {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn Database>, retry: RetryPolicy) -> Self {
        Self { llm, store, retry }
    }

    pub async fn has_profile(&self) -> Result<bool> {
        Ok(self.store.get_profile().await?.is_some())
    }

    /// Analyze collected history and save the result as the active profile.
    pub async fn analyze(&self, data: &CollectedData) -> Result<PersonalityProfile> {
        if data.records.is_empty() {
            return Err(ProfileError::NoData.into());
        }

        let stats = ContentStats::from_records(&data.records);
        let estimate = stats.estimate();
        tracing::info!(
            posts = stats.post_count,
            likes = stats.like_count,
            "Starting personality analysis"
        );

        let mut profile = match self.judge(data, &stats).await {
            Ok(judged) => combine(&estimate, &judged),
            Err(e) => {
                tracing::warn!(error = %e, "Model analysis unavailable, using statistics only");
                estimate
            }
        };
        profile.created_at = Utc::now();

        self.store
            .save_profile(&profile)
            .await
            .map_err(ProfileError::from)?;
        tracing::info!(
            source = profile.source.as_str(),
            mean_confidence = profile.mean_confidence(),
            "Personality profile saved"
        );
        Ok(profile)
    }

    async fn judge(
        &self,
        data: &CollectedData,
        stats: &ContentStats,
    ) -> Result<Vec<(Dimension, DimensionScore)>> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(data, stats)),
        ])
        .with_temperature(ANALYSIS_TEMPERATURE)
        .with_max_tokens(ANALYSIS_MAX_TOKENS);

        let response = with_backoff(&self.retry, "personality analysis", || {
            self.llm.complete(request.clone())
        })
        .await?;
        Ok(parse_analysis(&response.content)?)
    }
}
