//! Threshold gate over scorer output.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use crate::decision::scorer::{ScoringConfig, score_post};
use crate::decision::{Action, Decision};
use crate::platform::types::Post;
use crate::profile::{PersonalityProfile, clamp_unit};
use crate::safety::ContentFilter;

/// Per-action score thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub like: f64,
    pub reply: f64,
    pub repost: f64,
    /// Floor on the overall engagement score below which nothing is selected.
    pub min_engagement: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            like: 0.5,
            reply: 0.55,
            repost: 0.6,
            min_engagement: 0.3,
        }
    }
}

impl Thresholds {
    pub fn for_action(&self, action: Action) -> f64 {
        match action {
            Action::Like => self.like,
            Action::Reply => self.reply,
            Action::Repost => self.repost,
        }
    }
}

/// Confidence for one selected action: 0.5 at the threshold, rising to 1.0 at
/// a perfect score.
fn margin_confidence(score: f64, threshold: f64) -> f64 {
    if threshold >= 1.0 {
        return 1.0;
    }
    clamp_unit(0.5 + 0.5 * (score - threshold) / (1.0 - threshold))
}

/// Decides how to engage with timeline posts and mentions.
pub struct DecisionEngine {
    scoring: ScoringConfig,
    thresholds: Thresholds,
    filter: Arc<ContentFilter>,
    bot_username: String,
    avoid_controversial: bool,
}

impl DecisionEngine {
    pub fn new(
        scoring: ScoringConfig,
        thresholds: Thresholds,
        filter: Arc<ContentFilter>,
        bot_username: impl Into<String>,
        avoid_controversial: bool,
    ) -> Self {
        Self {
            scoring,
            thresholds,
            filter,
            bot_username: bot_username.into(),
            avoid_controversial,
        }
    }

    /// Decide on a timeline post.
    ///
    /// Without a profile the neutral profile is used.
    pub fn decide(&self, post: &Post, profile: Option<&PersonalityProfile>) -> Decision {
        if post.is_authored_by(&self.bot_username) {
            return Decision::ignore("own post");
        }

        let verdict = self.filter.check_incoming(&post.text);
        if verdict.blocked {
            return Decision::ignore(format!("blocked: {}", verdict.reasons.join(", ")));
        }

        if self.avoid_controversial {
            let topic_hit = self.filter.mentions_avoided_topic(&post.text).or_else(|| {
                post.topics
                    .iter()
                    .find_map(|t| self.filter.mentions_avoided_topic(t))
            });
            if let Some(topic) = topic_hit {
                return Decision::ignore(format!("avoided topic '{topic}'"));
            }
        }

        let neutral;
        let profile = match profile {
            Some(p) => p,
            None => {
                neutral = PersonalityProfile::neutral();
                &neutral
            }
        };

        let breakdown = score_post(post, profile, &self.scoring);
        let mut reasoning = breakdown.hints.clone();
        let mut actions = BTreeSet::new();

        if breakdown.engagement_score >= self.thresholds.min_engagement {
            for action in Action::ALL {
                if action == Action::Repost && post.is_repost() {
                    continue;
                }
                let score = breakdown.action_score(action);
                let threshold = self.thresholds.for_action(action);
                if score >= threshold {
                    actions.insert(action);
                    reasoning.push(format!("{action} {score:.2} >= {threshold:.2}"));
                }
            }
        } else {
            reasoning.push(format!(
                "engagement {:.2} below minimum {:.2}",
                breakdown.engagement_score, self.thresholds.min_engagement
            ));
        }

        let confidence = if actions.is_empty() {
            clamp_unit(1.0 - breakdown.engagement_score)
        } else {
            let mean = actions
                .iter()
                .map(|a| margin_confidence(breakdown.action_score(*a), self.thresholds.for_action(*a)))
                .sum::<f64>()
                / actions.len() as f64;
            clamp_unit(mean * (0.5 + 0.5 * profile.mean_confidence()))
        };

        tracing::debug!(
            post_id = %post.id,
            actions = ?actions,
            engagement = breakdown.engagement_score,
            confidence,
            "Scored post"
        );

        Decision {
            actions,
            engagement_score: breakdown.engagement_score,
            confidence,
            reasoning,
            breakdown: Some(breakdown),
        }
    }

    /// Decide on a post that mentions the user: reply and like unless the
    /// safety filter blocks it.
    pub fn decide_mention(&self, post: &Post) -> Decision {
        if post.is_authored_by(&self.bot_username) {
            return Decision::ignore("own post");
        }
        let verdict = self.filter.check_incoming(&post.text);
        if verdict.blocked {
            return Decision::ignore(format!("blocked: {}", verdict.reasons.join(", ")));
        }
        Decision {
            actions: BTreeSet::from([Action::Reply, Action::Like]),
            engagement_score: 1.0,
            confidence: 0.9,
            reasoning: vec!["direct mention".to_string()],
            breakdown: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Dimension;
    use crate::safety::SafetyConfig;
    use crate::testing::post;

    fn engine_with(thresholds: Thresholds, avoided: &[&str]) -> DecisionEngine {
        let avoided: Vec<String> = avoided.iter().map(|s| s.to_string()).collect();
        let filter = ContentFilter::new(&SafetyConfig {
            safe_mode: true,
            blocked_terms: Vec::new(),
            avoided_topics: avoided.clone(),
        })
        .unwrap();
        let scoring = ScoringConfig::new(
            &Default::default(),
            &[],
            &avoided,
            Default::default(),
        )
        .unwrap();
        DecisionEngine::new(scoring, thresholds, Arc::new(filter), "me", true)
    }

    fn engine() -> DecisionEngine {
        engine_with(Thresholds::default(), &["politic"])
    }

    fn confident_profile() -> PersonalityProfile {
        let mut p = PersonalityProfile::neutral();
        for d in Dimension::ALL {
            p.set(d, p.score(d), 1.0);
        }
        p
    }

    #[test]
    fn ignores_own_posts() {
        let mut p = post("Any thoughts on this?");
        p.author.username = "Me".to_string();
        let d = engine().decide(&p, None);
        assert!(d.is_ignore());
        assert_eq!(d.reasoning, vec!["own post".to_string()]);
    }

    #[test]
    fn ignores_blocked_content() {
        let d = engine().decide(&post("kys?"), None);
        assert!(d.is_ignore());
        assert!(d.reasoning[0].starts_with("blocked"));
        assert!(d.breakdown.is_none());
    }

    #[test]
    fn ignores_avoided_topics() {
        let d = engine().decide(&post("Thoughts on politics?"), None);
        assert!(d.is_ignore());
        assert!(d.reasoning[0].contains("politic"));
    }

    #[test]
    fn question_gets_a_reply() {
        let d = engine().decide(&post("Which editor do you use?"), None);
        assert!(d.contains(Action::Reply));
        assert_eq!(d.primary(), Some(Action::Reply));
        assert!(d.confidence > 0.0 && d.confidence <= 1.0);
    }

    #[test]
    fn positive_post_gets_a_like() {
        let d = engine().decide(&post("This release is awesome"), None);
        assert!(d.contains(Action::Like));
        assert!(!d.contains(Action::Reply));
    }

    #[test]
    fn never_reposts_a_repost() {
        let mut p = post("RT @dev: great tutorial");
        p.author.followers_count = Some(100_000);
        let d = engine().decide(&p, None);
        assert!(!d.contains(Action::Repost));
    }

    #[test]
    fn plain_post_is_ignored_with_inverse_confidence() {
        let d = engine().decide(&post("had lunch"), None);
        assert!(d.is_ignore());
        assert_eq!(d.confidence, 1.0 - d.engagement_score);
    }

    #[test]
    fn min_engagement_gates_everything() {
        let thresholds = Thresholds {
            min_engagement: 0.99,
            ..Default::default()
        };
        let d = engine_with(thresholds, &[]).decide(&post("Which editor do you use?"), None);
        assert!(d.is_ignore());
    }

    #[test]
    fn raising_thresholds_never_adds_actions() {
        let texts = [
            "Which editor do you use?",
            "This release is awesome, thanks!",
            "Great rust tutorial, really useful guide",
            "lol that joke is funny",
            "had lunch",
        ];
        let profile = confident_profile();
        let steps = [0.0, 0.2, 0.4, 0.5, 0.55, 0.6, 0.8, 1.0];
        for text in texts {
            let p = post(text);
            for action in Action::ALL {
                let mut previous: Option<BTreeSet<Action>> = None;
                for step in steps {
                    let mut t = Thresholds {
                        min_engagement: 0.0,
                        ..Default::default()
                    };
                    match action {
                        Action::Like => t.like = step,
                        Action::Reply => t.reply = step,
                        Action::Repost => t.repost = step,
                    }
                    let actions = engine_with(t, &[]).decide(&p, Some(&profile)).actions;
                    if let Some(prev) = &previous {
                        assert!(
                            actions.is_subset(prev),
                            "{text}: raising {action} to {step} added actions"
                        );
                    }
                    previous = Some(actions);
                }
            }
        }
    }

    #[test]
    fn confidence_tracks_profile_confidence() {
        let p = post("Which editor do you use?");
        let unsure = engine().decide(&p, Some(&PersonalityProfile::neutral()));
        let sure = engine().decide(&p, Some(&confident_profile()));
        assert!(sure.confidence > unsure.confidence);
    }

    #[test]
    fn mentions_get_reply_and_like() {
        let d = engine().decide_mention(&post("@me hello there"));
        assert_eq!(d.actions, BTreeSet::from([Action::Like, Action::Reply]));
        assert_eq!(d.confidence, 0.9);

        let d = engine().decide_mention(&post("@me kys"));
        assert!(d.is_ignore());
    }

    #[test]
    fn margin_confidence_bounds() {
        assert_eq!(margin_confidence(0.5, 0.5), 0.5);
        assert_eq!(margin_confidence(1.0, 0.5), 1.0);
        assert_eq!(margin_confidence(1.0, 1.0), 1.0);
    }
}
