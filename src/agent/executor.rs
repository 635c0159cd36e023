//! Timeline and mention passes.
//!
//! Each unseen post gets a decision; selected actions run in the order
//! like, reply, repost, each subject to its hourly quota. The post is then
//! marked processed whatever the outcome, so it is never reconsidered.

use crate::agent::Agent;
use crate::db::InteractionRecord;
use crate::decision::{Action, Decision};
use crate::error::{PlatformError, Result};
use crate::platform::{Post, User};
use crate::profile::PersonalityProfile;

/// Home timeline posts fetched per pass.
const TIMELINE_BATCH: usize = 50;
/// Mentions fetched per pass.
const MENTIONS_BATCH: usize = 20;
/// Characters of post text shown in log lines.
const PREVIEW_CHARS: usize = 50;

/// Collapse text into a single-line preview for logs.
pub(crate) fn truncate_for_preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    // char_indices gives byte offsets at char boundaries, so the slice is always valid UTF-8.
    match collapsed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &collapsed[..idx]),
        None => collapsed,
    }
}

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub seen: usize,
    pub already_processed: usize,
    pub ignored: usize,
    pub liked: usize,
    pub replied: usize,
    pub reposted: usize,
    /// Actions skipped because the hourly quota was used up.
    pub over_quota: usize,
    /// Actions that would have run outside dry-run mode.
    pub dry_run: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record_success(&mut self, action: Action) {
        match action {
            Action::Like => self.liked += 1,
            Action::Reply => self.replied += 1,
            Action::Repost => self.reposted += 1,
        }
    }

    pub(crate) fn log(&self, pass: &str) {
        tracing::info!(
            pass,
            seen = self.seen,
            already_processed = self.already_processed,
            ignored = self.ignored,
            liked = self.liked,
            replied = self.replied,
            reposted = self.reposted,
            over_quota = self.over_quota,
            dry_run = self.dry_run,
            failed = self.failed,
            "Pass complete"
        );
    }
}

enum Mode {
    Timeline,
    Mentions,
}

impl Agent {
    /// Evaluate new home timeline posts and act on them.
    pub async fn process_timeline(&self) -> Result<CycleReport> {
        tracing::debug!("Processing timeline");
        let me = self.account().await?;
        let posts = self
            .deps
            .platform
            .home_timeline(&me.id, TIMELINE_BATCH)
            .await?;
        self.process(&me, posts, Mode::Timeline).await
    }

    /// Evaluate new mentions and answer them.
    pub async fn process_mentions(&self) -> Result<CycleReport> {
        tracing::debug!("Processing mentions");
        let me = self.account().await?;
        let posts = self.deps.platform.mentions(&me.id, MENTIONS_BATCH).await?;
        self.process(&me, posts, Mode::Mentions).await
    }

    async fn process(&self, me: &User, posts: Vec<Post>, mode: Mode) -> Result<CycleReport> {
        let profile = self.deps.store.get_profile().await?;
        let mut report = CycleReport::default();

        for post in posts {
            report.seen += 1;
            if self.deps.store.is_processed(&post.id).await? {
                report.already_processed += 1;
                continue;
            }

            let decision = match mode {
                Mode::Timeline => self.engine.decide(&post, profile.as_ref()),
                Mode::Mentions => self.engine.decide_mention(&post),
            };
            tracing::debug!(
                post_id = %post.id,
                author = %post.author.username,
                actions = ?decision.actions,
                engagement = decision.engagement_score,
                confidence = decision.confidence,
                reasoning = %decision.reasoning_text(),
                "Decision"
            );

            if decision.is_ignore() {
                report.ignored += 1;
            } else {
                self.execute(me, &post, &decision, profile.as_ref(), &mut report)
                    .await?;
            }
            self.deps.store.mark_processed(&post.id, &decision).await?;
        }
        Ok(report)
    }

    /// Run the decision's actions in like, reply, repost order.
    async fn execute(
        &self,
        me: &User,
        post: &Post,
        decision: &Decision,
        profile: Option<&PersonalityProfile>,
        report: &mut CycleReport,
    ) -> Result<()> {
        for action in Action::ALL {
            if !decision.contains(action) {
                continue;
            }
            if !self.limiter.check(action).await? {
                tracing::info!(action = %action, post_id = %post.id, "Hourly quota reached, skipping");
                report.over_quota += 1;
                continue;
            }

            let reply_text = if action == Action::Reply {
                match self.generator.generate_reply(post, decision, profile).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        tracing::warn!(post_id = %post.id, error = %e, "Failed to generate reply");
                        report.failed += 1;
                        continue;
                    }
                }
            } else {
                None
            };

            if self.config.dry_run {
                match &reply_text {
                    Some(text) => tracing::info!(
                        "[dry run] Would reply to @{}: {}",
                        post.author.username,
                        text
                    ),
                    None => tracing::info!(
                        "[dry run] Would {} post by @{}: {}",
                        action,
                        post.author.username,
                        truncate_for_preview(&post.text, PREVIEW_CHARS)
                    ),
                }
                report.dry_run += 1;
                continue;
            }

            let outcome = self.perform(me, post, action, reply_text.as_deref()).await;
            let mut record = InteractionRecord::new(&post.id, action, decision.reasoning_text());
            if let Some(text) = &reply_text {
                record = record.with_content(text.clone());
            }

            match outcome {
                Ok(()) => {
                    tracing::info!(
                        action = %action,
                        post_id = %post.id,
                        author = %post.author.username,
                        "Action performed"
                    );
                    report.record_success(action);
                }
                Err(e) => {
                    tracing::error!(action = %action, post_id = %post.id, error = %e, "Action failed");
                    record = record.failed();
                    report.failed += 1;
                }
            }
            // The write already happened; the post must still be marked
            // processed so it is not acted on again.
            if let Err(e) = self.deps.store.log_interaction(&record).await {
                tracing::warn!(
                    action = %action,
                    post_id = %post.id,
                    error = %e,
                    "Failed to log interaction"
                );
            }
        }
        Ok(())
    }

    async fn perform(
        &self,
        me: &User,
        post: &Post,
        action: Action,
        reply_text: Option<&str>,
    ) -> std::result::Result<(), PlatformError> {
        let platform = &self.deps.platform;
        match (action, reply_text) {
            (Action::Like, _) => platform.like(&me.id, &post.id).await,
            (Action::Repost, _) => platform.repost(&me.id, &post.id).await,
            (Action::Reply, Some(text)) => platform.reply(&post.id, text).await.map(|id| {
                tracing::debug!(post_id = %post.id, reply_id = %id, "Reply posted");
            }),
            (Action::Reply, None) => Err(PlatformError::InvalidResponse {
                platform: platform.name().to_string(),
                reason: "reply requested without text".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::agent::AgentDeps;
    use crate::config::Config;
    use crate::db::{Database, InteractionStore, ProfileStore};
    use crate::settings::Settings;
    use crate::testing::{StubLlm, StubPlatform, post, test_db};

    const REPLY: &str = "Tokio, every time. What are you building?";

    fn config(dry_run: bool) -> Config {
        let mut config = {
            let _lock = crate::config::helpers::tests::ENV_LOCK.lock();
            Config::resolve(&Settings::default()).unwrap()
        };
        config.bot_username = "me".to_string();
        config.agent.dry_run = dry_run;
        config
    }

    async fn setup(config: Config) -> (Agent, Arc<StubPlatform>, Arc<dyn Database>, tempfile::TempDir) {
        let (db, dir) = test_db().await;
        let platform = Arc::new(StubPlatform::new());
        let agent = Agent::new(
            &config,
            AgentDeps {
                store: db.clone(),
                llm: Arc::new(StubLlm::new(REPLY)),
                platform: platform.clone(),
            },
        )
        .unwrap();
        (agent, platform, db, dir)
    }

    fn mention() -> Post {
        post("@me which async runtime do you recommend?")
    }

    #[test]
    fn preview_collapses_and_truncates() {
        assert_eq!(truncate_for_preview("a\n  b", 10), "a b");
        assert_eq!(truncate_for_preview("abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn mentions_get_reply_and_like() {
        let (agent, platform, db, _dir) = setup(config(false)).await;
        let m = mention();
        platform.set_mentions(vec![m.clone()]);

        let report = agent.process_mentions().await.unwrap();
        assert_eq!(report.replied, 1);
        assert_eq!(report.liked, 1);
        assert_eq!(platform.replies(), vec![(m.id.clone(), REPLY.to_string())]);
        assert_eq!(platform.liked(), vec![m.id.clone()]);

        let log = db.recent_interactions(1).await.unwrap();
        assert_eq!(log.len(), 2);
        let reply = log.iter().find(|r| r.action == Action::Reply).unwrap();
        assert_eq!(reply.content.as_deref(), Some(REPLY));
        assert!(reply.success);
        assert!(db.is_processed(&m.id).await.unwrap());
    }

    #[tokio::test]
    async fn processed_posts_are_skipped() {
        let (agent, platform, _db, _dir) = setup(config(false)).await;
        platform.set_mentions(vec![mention()]);

        agent.process_mentions().await.unwrap();
        let second = agent.process_mentions().await.unwrap();
        assert_eq!(second.already_processed, 1);
        assert_eq!(platform.replies().len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn dry_run_never_writes() {
        let (agent, platform, db, _dir) = setup(config(true)).await;
        let m = mention();
        platform.set_mentions(vec![m.clone()]);

        let report = agent.process_mentions().await.unwrap();
        assert_eq!(report.dry_run, 2);
        assert!(platform.replies().is_empty());
        assert!(platform.liked().is_empty());
        assert!(db.recent_interactions(1).await.unwrap().is_empty());
        assert!(db.is_processed(&m.id).await.unwrap());
        assert!(logs_contain("[dry run]"));
    }

    #[tokio::test]
    async fn failed_writes_are_logged_as_failures() {
        let (agent, platform, db, _dir) = setup(config(false)).await;
        platform.set_mentions(vec![mention()]);
        platform.fail_writes();

        let report = agent.process_mentions().await.unwrap();
        assert_eq!(report.failed, 2);
        let log = db.recent_interactions(1).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn quota_limits_actions() {
        let mut cfg = config(false);
        cfg.quota.replies_per_hour = 0;
        let (agent, platform, _db, _dir) = setup(cfg).await;
        platform.set_mentions(vec![mention()]);

        let report = agent.process_mentions().await.unwrap();
        assert_eq!(report.over_quota, 1);
        assert_eq!(report.liked, 1);
        assert!(platform.replies().is_empty());
    }

    #[tokio::test]
    async fn timeline_ignores_own_and_low_scoring_posts() {
        let (agent, platform, db, _dir) = setup(config(false)).await;
        db.save_profile(&PersonalityProfile::neutral()).await.unwrap();
        let mut own = post("Just shipped a release!");
        own.author.username = "me".to_string();
        let dull = post("ok");
        platform.set_timeline(vec![own.clone(), dull.clone()]);

        let report = agent.process_timeline().await.unwrap();
        assert_eq!(report.seen, 2);
        assert_eq!(report.ignored, 2);
        assert!(platform.liked().is_empty());
        assert!(db.is_processed(&own.id).await.unwrap());
        assert!(db.is_processed(&dull.id).await.unwrap());
    }

    #[tokio::test]
    async fn log_failure_still_marks_processed() {
        let dir = tempfile::tempdir().unwrap();
        let backend = crate::db::libsql::LibSqlBackend::new_local(&dir.path().join("t.db"))
            .await
            .unwrap();
        backend.run_migrations().await.unwrap();
        backend
            .connect()
            .await
            .unwrap()
            .execute(
                "CREATE TRIGGER reject_log BEFORE INSERT ON interaction_log \
                 BEGIN SELECT RAISE(ABORT, 'log unavailable'); END",
                libsql::params![],
            )
            .await
            .unwrap();
        let db: Arc<dyn Database> = Arc::new(backend);

        let platform = Arc::new(StubPlatform::new());
        let agent = Agent::new(
            &config(false),
            AgentDeps {
                store: db.clone(),
                llm: Arc::new(StubLlm::new(REPLY)),
                platform: platform.clone(),
            },
        )
        .unwrap();
        let m = mention();
        platform.set_mentions(vec![m.clone()]);

        let report = agent.process_mentions().await.unwrap();
        assert_eq!(report.replied, 1);
        assert!(db.is_processed(&m.id).await.unwrap());

        agent.process_mentions().await.unwrap();
        assert_eq!(platform.replies().len(), 1);
    }
}
