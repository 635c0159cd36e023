//! Content safety filter.
//!
//! Screens both directions: incoming posts (blocked terms only, so the agent
//! does not engage with abuse) and generated replies (blocked terms, PII and
//! prompt-leak markers, so the agent never posts them).

use std::sync::LazyLock;

use aho_corasick::{AhoCorasick, MatchKind};
use regex::Regex;

use crate::error::{ConfigError, SafetyError};

/// Terms that are always blocked in safe mode.
const BUILTIN_BLOCKED_TERMS: &[&str] = &[
    "kill yourself",
    "kys",
    "hope you die",
    "go die",
    "retard",
    "send nudes",
];

/// Phrases that mean the model leaked its instructions or broke character.
const PROMPT_LEAK_MARKERS: &[&str] = &[
    "as an ai language model",
    "as an ai model",
    "as a language model",
    "system prompt",
    "my instructions",
    "i cannot fulfill",
];

struct PiiPattern {
    name: &'static str,
    regex: Regex,
}

static PII_PATTERNS: LazyLock<Vec<PiiPattern>> = LazyLock::new(|| {
    [
        ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
        ("phone", r"\b\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b"),
        ("card_number", r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b"),
    ]
    .into_iter()
    .map(|(name, p)| PiiPattern {
        name,
        regex: Regex::new(p).expect("hardcoded regex must compile"),
    })
    .collect()
});

/// Filter configuration.
#[derive(Debug, Clone, Default)]
pub struct SafetyConfig {
    /// When off, only PII and prompt-leak checks run.
    pub safe_mode: bool,
    /// Extra user-supplied blocked terms.
    pub blocked_terms: Vec<String>,
    pub avoided_topics: Vec<String>,
}

/// Result of a safety check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub blocked: bool,
    pub reasons: Vec<String>,
}

impl SafetyVerdict {
    fn block(&mut self, reason: String) {
        self.blocked = true;
        self.reasons.push(reason);
    }

    pub fn into_result(self) -> Result<(), SafetyError> {
        if self.blocked {
            Err(SafetyError::BlockedContent {
                pattern: self.reasons.join(", "),
            })
        } else {
            Ok(())
        }
    }
}

/// Case-insensitive phrase matcher over a term list.
struct TermMatcher {
    terms: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl TermMatcher {
    fn new(key: &str, terms: Vec<String>) -> Result<Self, ConfigError> {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Ok(Self {
                terms,
                automaton: None,
            });
        }
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&terms)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            terms,
            automaton: Some(automaton),
        })
    }

    /// Terms found in `text`. With `whole_word`, a match must not continue a
    /// word on either side; otherwise only the start must be a word boundary
    /// (so "politic" matches "politics").
    fn find(&self, text: &str, whole_word: bool) -> Vec<&str> {
        let Some(automaton) = &self.automaton else {
            return Vec::new();
        };
        let mut found: Vec<&str> = Vec::new();
        for m in automaton.find_iter(text) {
            let before_ok = text[..m.start()]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
            let after_ok = !whole_word
                || text[m.end()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_alphanumeric());
            let term = self.terms[m.pattern().as_usize()].as_str();
            if before_ok && after_ok && !found.contains(&term) {
                found.push(term);
            }
        }
        found
    }
}

/// Content safety filter.
pub struct ContentFilter {
    safe_mode: bool,
    blocked: TermMatcher,
    leak_markers: TermMatcher,
    avoided_topics: TermMatcher,
}

impl ContentFilter {
    pub fn new(config: &SafetyConfig) -> Result<Self, ConfigError> {
        let mut blocked: Vec<String> = BUILTIN_BLOCKED_TERMS.iter().map(|t| t.to_string()).collect();
        blocked.extend(config.blocked_terms.iter().cloned());
        Ok(Self {
            safe_mode: config.safe_mode,
            blocked: TermMatcher::new("content.blocked_terms", blocked)?,
            leak_markers: TermMatcher::new(
                "prompt_leak_markers",
                PROMPT_LEAK_MARKERS.iter().map(|t| t.to_string()).collect(),
            )?,
            avoided_topics: TermMatcher::new(
                "content.avoided_topics",
                config.avoided_topics.clone(),
            )?,
        })
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    /// Check outgoing text before it is posted.
    pub fn check(&self, text: &str) -> SafetyVerdict {
        let mut verdict = self.check_incoming(text);
        for pattern in PII_PATTERNS.iter() {
            if pattern.regex.is_match(text) {
                verdict.block(format!("contains {}", pattern.name));
            }
        }
        for marker in self.leak_markers.find(text, false) {
            verdict.block(format!("prompt leak marker '{marker}'"));
        }
        verdict
    }

    /// Check incoming content the agent might engage with.
    pub fn check_incoming(&self, text: &str) -> SafetyVerdict {
        let mut verdict = SafetyVerdict::default();
        if self.safe_mode {
            for term in self.blocked.find(text, true) {
                verdict.block(format!("blocked term '{term}'"));
            }
        }
        verdict
    }

    /// Check a reply and its length against the character ceiling.
    pub fn check_reply(&self, text: &str, max_chars: usize) -> Result<(), SafetyError> {
        let length = text.chars().count();
        if length > max_chars {
            return Err(SafetyError::OutputTooLarge {
                length,
                max: max_chars,
            });
        }
        self.check(text).into_result()
    }

    /// First avoided topic the text touches, if any.
    pub fn mentions_avoided_topic(&self, text: &str) -> Option<&str> {
        self.avoided_topics.find(text, false).into_iter().next()
    }
}
