//! Reply generation in the user's voice.

use std::sync::Arc;

use crate::decision::Decision;
use crate::error::GenerationError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::platform::types::Post;
use crate::profile::{Dimension, PersonalityProfile};
use crate::safety::ContentFilter;

const SYSTEM_PROMPT: &str = "You write short social media replies in the voice of the account \
owner. Reply with the reply text only: no preamble, no quotes, no labels.";

const ELLIPSIS: &str = "...";

/// Sampling and length settings for replies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Hard ceiling on reply length in characters.
    pub max_chars: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 280,
            max_chars: 280,
        }
    }
}

/// Style directives derived from the profile.
pub fn style_directives(profile: &PersonalityProfile) -> Vec<&'static str> {
    let mut out = Vec::new();
    if profile.score(Dimension::HumorLevel) > 0.7 {
        out.push("Be humorous and witty.");
    }
    if profile.score(Dimension::Formality) < 0.3 {
        out.push("Be casual and informal.");
    } else {
        out.push("Be professional but friendly.");
    }
    if profile.score(Dimension::Enthusiasm) > 0.7 {
        out.push("Sound energetic and upbeat.");
    }
    if profile.score(Dimension::TechnicalDepth) > 0.6 {
        out.push("Be technically precise.");
    }
    if profile.score(Dimension::EmojiUsage) < 0.2 {
        out.push("Do not use emoji.");
    }
    if profile.score(Dimension::HashtagUsage) < 0.2 {
        out.push("Do not use hashtags.");
    }
    out
}

/// Cut `text` to at most `max_chars` characters.
///
/// Over-length text loses its tail at the last word boundary in the back half
/// of the budget (or mid-word when there is none) and gets a `...` suffix.
/// Ceilings below 3 cannot fit the suffix and get as much of it as fits.
pub fn truncate_to_ceiling(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars < ELLIPSIS.len() {
        return ELLIPSIS[..max_chars].to_string();
    }
    let budget = max_chars - ELLIPSIS.len();
    let prefix: String = text.chars().take(budget).collect();
    let cut = prefix
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .next_back()
        .filter(|i| prefix[..*i].chars().count() >= budget / 2);
    let kept = match cut {
        Some(i) => prefix[..i].trim_end(),
        None => prefix.as_str(),
    };
    format!("{kept}{ELLIPSIS}")
}

/// Strip the wrapping a model tends to add around the reply itself.
pub fn clean_reply(raw: &str) -> String {
    let mut text = raw.trim();
    for label in ["reply:", "response:"] {
        if text.len() >= label.len()
            && text.is_char_boundary(label.len())
            && text[..label.len()].eq_ignore_ascii_case(label)
        {
            text = text[label.len()..].trim_start();
        }
    }
    for (open, close) in [('"', '"'), ('\u{201C}', '\u{201D}'), ('\'', '\'')] {
        if text.chars().count() >= 2 && text.starts_with(open) && text.ends_with(close) {
            text = text[open.len_utf8()..text.len() - close.len_utf8()].trim();
        }
    }
    text.to_string()
}

/// Generates replies with the language model.
pub struct ContentGenerator {
    llm: Arc<dyn LlmProvider>,
    filter: Arc<ContentFilter>,
    settings: GenerationSettings,
}

impl ContentGenerator {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        filter: Arc<ContentFilter>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            llm,
            filter,
            settings,
        }
    }

    fn build_prompt(&self, post: &Post, decision: &Decision, profile: &PersonalityProfile) -> String {
        let context = if decision.reasoning.is_empty() {
            "General response".to_string()
        } else {
            decision.reasoning_text()
        };
        format!(
            "{style}\n\nRespond to this post: \"{text}\"\n\nAuthor: @{author}\nContext: {context}\n\n\
             Write a helpful, engaging reply that fits this personality. \
             Keep it under {max} characters.",
            style = style_directives(profile).join(" "),
            text = post.text,
            author = post.author.username,
            max = self.settings.max_chars,
        )
    }

    /// Generate a reply to `post`. Without a profile the neutral one is used.
    pub async fn generate_reply(
        &self,
        post: &Post,
        decision: &Decision,
        profile: Option<&PersonalityProfile>,
    ) -> Result<String, GenerationError> {
        let neutral;
        let profile = match profile {
            Some(p) => p,
            None => {
                neutral = PersonalityProfile::neutral();
                &neutral
            }
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(self.build_prompt(post, decision, profile)),
        ])
        .with_temperature(self.settings.temperature)
        .with_max_tokens(self.settings.max_tokens);

        let response = self.llm.complete(request).await?;
        let cleaned = clean_reply(&response.content);
        if cleaned.is_empty() {
            return Err(GenerationError::Empty);
        }

        let reply = truncate_to_ceiling(&cleaned, self.settings.max_chars);
        self.filter.check_reply(&reply, self.settings.max_chars)?;

        tracing::info!(post_id = %post.id, chars = reply.chars().count(), "Generated reply");
        Ok(reply)
    }
}
