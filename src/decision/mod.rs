//! Engagement decisions.
//!
//! The [`scorer`] turns a post plus the personality profile into per-action
//! scores; the [`engine`] applies hard gates and thresholds to produce a
//! [`Decision`].

pub mod engine;
pub mod scorer;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use engine::{DecisionEngine, Thresholds};
pub use scorer::{ScoreBreakdown, ScoringConfig, score_post};

/// An action the agent can take on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Like,
    Reply,
    Repost,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Like, Action::Reply, Action::Repost];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Like => "like",
            Action::Reply => "reply",
            Action::Repost => "repost",
        }
    }

    /// Precedence when a single "main" action is needed.
    fn rank(&self) -> u8 {
        match self {
            Action::Reply => 3,
            Action::Repost => 2,
            Action::Like => 1,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "like" => Ok(Action::Like),
            "reply" => Ok(Action::Reply),
            "repost" | "retweet" => Ok(Action::Repost),
            other => Err(format!("unknown action '{other}'")),
        }
    }
}

/// Outcome of evaluating one post.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Selected actions; empty means ignore.
    pub actions: BTreeSet<Action>,
    pub engagement_score: f64,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    /// Scorer output, absent when a hard gate short-circuited scoring.
    pub breakdown: Option<ScoreBreakdown>,
}

impl Decision {
    /// An ignore decision with a single reason.
    pub fn ignore(reason: impl Into<String>) -> Self {
        Self {
            actions: BTreeSet::new(),
            engagement_score: 0.0,
            confidence: 1.0,
            reasoning: vec![reason.into()],
            breakdown: None,
        }
    }

    pub fn is_ignore(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn contains(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// Highest-precedence selected action (Reply > Repost > Like).
    pub fn primary(&self) -> Option<Action> {
        self.actions.iter().copied().max_by_key(Action::rank)
    }

    /// Reasoning joined into one line for logs and the interaction log.
    pub fn reasoning_text(&self) -> String {
        self.reasoning.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_prefers_reply_then_repost() {
        let mut d = Decision::ignore("x");
        assert_eq!(d.primary(), None);
        assert!(d.is_ignore());

        d.actions.insert(Action::Like);
        assert_eq!(d.primary(), Some(Action::Like));
        d.actions.insert(Action::Repost);
        assert_eq!(d.primary(), Some(Action::Repost));
        d.actions.insert(Action::Reply);
        assert_eq!(d.primary(), Some(Action::Reply));
        assert!(!d.is_ignore());
    }

    #[test]
    fn action_parses_legacy_retweet() {
        assert_eq!("retweet".parse::<Action>().unwrap(), Action::Repost);
        assert_eq!("Like".parse::<Action>().unwrap(), Action::Like);
        assert!("boost".parse::<Action>().is_err());
    }

    #[test]
    fn reasoning_is_joined() {
        let mut d = Decision::ignore("own post");
        d.reasoning.push("second".to_string());
        assert_eq!(d.reasoning_text(), "own post; second");
    }
}
