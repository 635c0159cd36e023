//! Platform-neutral post and account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account on the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Follower count when the platform returned it.
    #[serde(default)]
    pub followers_count: Option<u64>,
}

impl User {
    /// Placeholder author for posts returned without an author expansion.
    pub fn unknown() -> Self {
        Self {
            id: "unknown".to_string(),
            username: "unknown".to_string(),
            name: "Unknown User".to_string(),
            description: String::new(),
            followers_count: None,
        }
    }
}

/// Public engagement counters on a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default, alias = "retweet_count")]
    pub repost_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

/// A single post (tweet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub author: User,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: PublicMetrics,
    /// Context annotation entity names attached by the platform.
    #[serde(default)]
    pub topics: Vec<String>,
}

impl Post {
    /// Whether the text is a manual repost or attribution of someone else's post.
    pub fn is_repost(&self) -> bool {
        let lower = self.text.trim_start().to_lowercase();
        lower.starts_with("rt @") || lower.contains("via @")
    }

    /// Whether the post was written by `username` (case-insensitive, `@` optional).
    pub fn is_authored_by(&self, username: &str) -> bool {
        let username = username.trim_start_matches('@');
        !username.is_empty() && self.author.username.eq_ignore_ascii_case(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(text: &str) -> Post {
        Post {
            id: "1".to_string(),
            text: text.to_string(),
            author: User::unknown(),
            created_at: Utc::now(),
            metrics: PublicMetrics::default(),
            topics: Vec::new(),
        }
    }

    #[test]
    fn repost_detection() {
        assert!(post("RT @someone: great thread").is_repost());
        assert!(post("Neat trick, via @rustlang").is_repost());
        assert!(!post("Rethinking async @ scale").is_repost());
    }

    #[test]
    fn authorship_ignores_case_and_at_sign() {
        let mut p = post("hello");
        p.author.username = "JaneDoe".to_string();
        assert!(p.is_authored_by("@janedoe"));
        assert!(!p.is_authored_by("john"));
        assert!(!p.is_authored_by(""));
    }

    #[test]
    fn metrics_accept_legacy_retweet_field() {
        let metrics: PublicMetrics =
            serde_json::from_str(r#"{"like_count": 3, "retweet_count": 7}"#).unwrap();
        assert_eq!(metrics.repost_count, 7);
        assert_eq!(metrics.reply_count, 0);
    }
}
