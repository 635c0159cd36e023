//! Statistical features over a user's collected records.
//!
//! Rates are per-post fractions (share of posts showing the feature), so a
//! single emoji-heavy post does not dominate. Own posts drive the style
//! dimensions; liked posts only contribute to topical ones (technical depth
//! and controversy tolerance), since a like says what the user reads, not how
//! they write.

use std::sync::LazyLock;

use regex::Regex;

use crate::collector::{RecordKind, UserRecord};
use crate::profile::{Dimension, PersonalityProfile, ProfileSource};

static RE_HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#\w+").expect("hardcoded regex must compile"));

static RE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("hardcoded regex must compile"));

static RE_HUMOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(lol|lmao|rofl|haha\w*|hehe\w*|joke\w*|funny|hilarious|pun|meme\w*|jk)\b")
        .expect("hardcoded regex must compile")
});

static RE_TECHNICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(api|code|coding|rust|python|javascript|typescript|golang|compiler|database|sql|algorithm\w*|kubernetes|docker|latency|deploy\w*|refactor\w*|bug\w*|programming|software|function|async|server|query|git|linux|benchmark\w*|memory|cpu|gpu|llm|model\w*)\b",
    )
    .expect("hardcoded regex must compile")
});

static RE_CASUAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(gonna|wanna|gotta|kinda|sorta|lol|omg|btw|tbh|imo|imho|idk|ya|yeah|yep|nah|dude|u|ur|pls|thx)\b")
        .expect("hardcoded regex must compile")
});

static RE_FORMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(therefore|however|furthermore|moreover|regarding|consequently|nevertheless|sincerely|accordingly|thus|hence|additionally)\b")
        .expect("hardcoded regex must compile")
});

static RE_CONTROVERSY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(politic\w*|election\w*|abortion|religio\w*|vaccin\w*|gun control|immigra\w*|war|protest\w*|scandal\w*|controvers\w*|censorship|partisan)\b")
        .expect("hardcoded regex must compile")
});

/// Whether a character falls in the common emoji blocks.
pub fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1F5FF // symbols & pictographs
        | 0x1F600..=0x1F64F // emoticons
        | 0x1F680..=0x1F6FF // transport & map
        | 0x1F900..=0x1F9FF // supplemental symbols
        | 0x1FA70..=0x1FAFF // symbols & pictographs ext-A
        | 0x2600..=0x26FF // misc symbols
        | 0x2700..=0x27BF // dingbats
    )
}

/// Aggregated text features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentStats {
    /// Number of the user's own posts.
    pub post_count: usize,
    /// Number of liked posts.
    pub like_count: usize,
    pub emoji_rate: f64,
    pub hashtag_rate: f64,
    pub exclamation_rate: f64,
    pub question_rate: f64,
    pub shout_rate: f64,
    pub link_rate: f64,
    pub humor_rate: f64,
    pub casual_rate: f64,
    pub formal_rate: f64,
    pub technical_rate: f64,
    pub liked_technical_rate: f64,
    pub controversy_rate: f64,
    pub liked_controversy_rate: f64,
    /// Mean own-post length in characters.
    pub mean_length: f64,
}

fn rate<F>(texts: &[&str], predicate: F) -> f64
where
    F: Fn(&str) -> bool,
{
    if texts.is_empty() {
        return 0.0;
    }
    texts.iter().filter(|t| predicate(t)).count() as f64 / texts.len() as f64
}

/// A post "shouts" when it has at least one fully upper-case word of 3+ letters.
fn has_shouting(text: &str) -> bool {
    text.split_whitespace().any(|w| {
        let letters: Vec<char> = w.chars().filter(|c| c.is_alphabetic()).collect();
        letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
    })
}

impl ContentStats {
    pub fn from_records(records: &[UserRecord]) -> Self {
        let posts: Vec<&str> = records
            .iter()
            .filter(|r| r.kind == RecordKind::Post)
            .map(|r| r.content.as_str())
            .collect();
        let likes: Vec<&str> = records
            .iter()
            .filter(|r| r.kind == RecordKind::Like)
            .map(|r| r.content.as_str())
            .collect();

        let mean_length = if posts.is_empty() {
            0.0
        } else {
            posts.iter().map(|t| t.chars().count()).sum::<usize>() as f64 / posts.len() as f64
        };

        Self {
            post_count: posts.len(),
            like_count: likes.len(),
            emoji_rate: rate(&posts, |t| t.chars().any(is_emoji)),
            hashtag_rate: rate(&posts, |t| RE_HASHTAG.is_match(t)),
            exclamation_rate: rate(&posts, |t| t.contains('!')),
            question_rate: rate(&posts, |t| t.contains('?')),
            shout_rate: rate(&posts, has_shouting),
            link_rate: rate(&posts, |t| RE_LINK.is_match(t)),
            humor_rate: rate(&posts, |t| RE_HUMOR.is_match(t)),
            casual_rate: rate(&posts, |t| RE_CASUAL.is_match(t)),
            formal_rate: rate(&posts, |t| RE_FORMAL.is_match(t)),
            technical_rate: rate(&posts, |t| RE_TECHNICAL.is_match(t)),
            liked_technical_rate: rate(&likes, |t| RE_TECHNICAL.is_match(t)),
            controversy_rate: rate(&posts, |t| RE_CONTROVERSY.is_match(t)),
            liked_controversy_rate: rate(&likes, |t| RE_CONTROVERSY.is_match(t)),
            mean_length,
        }
    }

    /// Confidence in the statistical estimate, growing with sample size.
    ///
    /// Saturates at 50 own posts; direct measurements (emoji, hashtags) cap at
    /// 0.9, inferred dimensions at 0.7.
    fn confidence(&self, direct: bool) -> f64 {
        let coverage = (self.post_count as f64 / 50.0).min(1.0);
        coverage * if direct { 0.9 } else { 0.7 }
    }

    /// Map the features onto the personality dimensions.
    pub fn estimate(&self) -> PersonalityProfile {
        let mut profile = PersonalityProfile::neutral();
        profile.source = ProfileSource::StatisticalOnly;
        profile.sample_size = self.post_count + self.like_count;

        let length_norm = (self.mean_length / 280.0).min(1.0);
        let technical = 0.7 * self.technical_rate + 0.3 * self.liked_technical_rate;
        let controversy = 0.7 * self.controversy_rate + 0.3 * self.liked_controversy_rate;

        let inferred = self.confidence(false);
        let direct = self.confidence(true);

        profile.set(Dimension::HumorLevel, self.humor_rate * 2.5, inferred);
        profile.set(
            Dimension::Formality,
            0.5 + self.formal_rate - self.casual_rate - 0.25 * self.emoji_rate
                + 0.2 * (length_norm - 0.5),
            inferred,
        );
        profile.set(
            Dimension::Enthusiasm,
            1.2 * self.exclamation_rate + 0.3 * self.emoji_rate + self.shout_rate,
            inferred,
        );
        profile.set(Dimension::TechnicalDepth, technical * 1.5, inferred);
        profile.set(Dimension::ControversyTolerance, controversy * 3.0, inferred);
        profile.set(Dimension::EmojiUsage, self.emoji_rate, direct);
        profile.set(Dimension::HashtagUsage, self.hashtag_rate, direct);
        profile
    }

    /// One-paragraph summary handed to the language model as extra evidence.
    pub fn summary(&self) -> String {
        format!(
            "{} posts, {} likes. Share of posts with: emoji {:.0}%, hashtags {:.0}%, \
             exclamation marks {:.0}%, questions {:.0}%, links {:.0}%, humor markers {:.0}%, \
             technical terms {:.0}%. Mean post length {:.0} characters.",
            self.post_count,
            self.like_count,
            self.emoji_rate * 100.0,
            self.hashtag_rate * 100.0,
            self.exclamation_rate * 100.0,
            self.question_rate * 100.0,
            self.link_rate * 100.0,
            self.humor_rate * 100.0,
            self.technical_rate * 100.0,
            self.mean_length,
        )
    }
}
