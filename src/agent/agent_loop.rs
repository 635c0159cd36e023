//! Main agent loop.
//!
//! Contains the `Agent` struct, `AgentDeps`, startup, and the scheduled run
//! loop. Per-post processing lives in `executor`.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::collector::Collector;
use crate::config::{AgentConfig, Config};
use crate::db::{CleanupStats, Database};
use crate::decision::DecisionEngine;
use crate::error::{Error, Result};
use crate::generator::ContentGenerator;
use crate::llm::LlmProvider;
use crate::platform::{SocialPlatform, User};
use crate::profile::PersonalityProfile;
use crate::profiler::Profiler;
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::safety::ContentFilter;

/// Pause after a failed cycle before polling again.
const ERROR_BACKOFF: Duration = Duration::from_secs(60);
/// How often old records are purged and recent history is refreshed.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// External collaborators of the agent.
pub struct AgentDeps {
    pub store: Arc<dyn Database>,
    pub llm: Arc<dyn LlmProvider>,
    pub platform: Arc<dyn SocialPlatform>,
}

/// Coordinates collection, profiling, decisions and execution.
pub struct Agent {
    pub(super) config: AgentConfig,
    pub(super) bot_username: String,
    pub(super) deps: AgentDeps,
    pub(super) collector: Collector,
    pub(super) profiler: Profiler,
    pub(super) engine: DecisionEngine,
    pub(super) generator: ContentGenerator,
    pub(super) limiter: RateLimiter,
    /// Authenticated account, resolved on first use.
    account: OnceLock<User>,
}

impl Agent {
    /// Build the agent and its components from configuration.
    pub fn new(config: &Config, deps: AgentDeps) -> Result<Self> {
        let filter = Arc::new(ContentFilter::new(&config.safety_config())?);
        let engine = DecisionEngine::new(
            config.scoring_config()?,
            config.thresholds,
            filter.clone(),
            config.bot_username.clone(),
            config.content.avoid_controversial,
        );
        let generator = ContentGenerator::new(deps.llm.clone(), filter, config.generation);
        let collector = Collector::new(
            deps.platform.clone(),
            deps.store.clone(),
            config.agent.post_window,
        );
        let profiler = Profiler::new(deps.llm.clone(), deps.store.clone(), RetryPolicy::default());
        let limiter = RateLimiter::new(deps.store.clone(), config.quota);

        Ok(Self {
            config: config.agent.clone(),
            bot_username: config.bot_username.clone(),
            deps,
            collector,
            profiler,
            engine,
            generator,
            limiter,
            account: OnceLock::new(),
        })
    }

    /// The authenticated account, verifying credentials on first call.
    pub async fn account(&self) -> Result<User> {
        if let Some(user) = self.account.get() {
            return Ok(user.clone());
        }
        let user = self.deps.platform.verify_credentials().await?;
        tracing::info!(
            platform = self.deps.platform.name(),
            username = %user.username,
            "Credentials verified"
        );
        let _ = self.account.set(user.clone());
        Ok(user)
    }

    async fn username(&self) -> Result<String> {
        if self.bot_username.is_empty() {
            Ok(self.account().await?.username)
        } else {
            Ok(self.bot_username.clone())
        }
    }

    /// Prepare storage, check credentials, and build a profile if none exists.
    pub async fn initialize(&self) -> Result<User> {
        tracing::info!("Initializing agent");
        self.deps.store.run_migrations().await?;
        let user = self.account().await?;

        if !self.profiler.has_profile().await? {
            tracing::info!("No personality profile found, starting analysis");
            self.analyze_personality().await?;
        }

        tracing::info!(dry_run = self.config.dry_run, "Agent initialization complete");
        Ok(user)
    }

    /// Collect the full history window and rebuild the profile from it.
    pub async fn analyze_personality(&self) -> Result<PersonalityProfile> {
        let username = self.username().await?;
        let data = self.collector.collect_all(&username).await?;
        self.profiler.analyze(&data).await
    }

    /// Purge processed markers and log entries past the retention window.
    pub async fn cleanup(&self) -> Result<CleanupStats> {
        Ok(self
            .deps
            .store
            .cleanup_older_than(self.config.retention_days)
            .await?)
    }

    /// Store the account's latest posts and likes alongside its history.
    pub async fn refresh_history(&self) -> Result<usize> {
        let username = self.username().await?;
        let data = self.collector.update_recent(&username).await?;
        Ok(data.total_interactions())
    }

    /// Daily upkeep: purge old records, then refresh recent history.
    async fn maintenance(&self) -> Result<()> {
        self.cleanup().await?;
        self.refresh_history().await?;
        Ok(())
    }

    /// Poll the timeline and mentions until `shutdown` resolves.
    ///
    /// A failed pass is logged and followed by a one-minute pause; it never
    /// ends the loop.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        let timeline_every = self.config.effective_interval(self.config.timeline_interval);
        let mentions_every = self.config.effective_interval(self.config.mentions_interval);
        tracing::info!(
            timeline_secs = timeline_every.as_secs(),
            mentions_secs = mentions_every.as_secs(),
            lite_mode = self.config.lite_mode,
            dry_run = self.config.dry_run,
            "Starting main loop"
        );

        let mut timeline = tokio::time::interval(timeline_every);
        let mut mentions = tokio::time::interval(mentions_every);
        let mut maintenance = tokio::time::interval(MAINTENANCE_INTERVAL);
        for ticker in [&mut timeline, &mut mentions, &mut maintenance] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        loop {
            let outcome: Result<()> = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping main loop");
                    break;
                }
                _ = timeline.tick() => self.process_timeline().await.map(|r| r.log("timeline")),
                _ = mentions.tick() => self.process_mentions().await.map(|r| r.log("mentions")),
                _ = maintenance.tick() => self.maintenance().await,
            };

            if let Err(e) = outcome {
                log_cycle_error(&e);
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        tracing::info!("Shutdown requested during back-off");
                        break;
                    }
                    _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                }
            }
        }
        Ok(())
    }
}

fn log_cycle_error(e: &Error) {
    tracing::error!(
        error = %e,
        backoff_secs = ERROR_BACKOFF.as_secs(),
        "Error in main loop, backing off"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::RecordKind;
    use crate::db::{InteractionStore, ProfileStore, UserDataStore};
    use crate::profile::ProfileSource;
    use crate::settings::Settings;
    use crate::testing::{StubLlm, StubPlatform, post, test_db};

    const ANALYSIS: &str = r#"{"humor_level": {"score": 0.8, "confidence": 0.9}}"#;

    fn test_config(dry_run: bool) -> Config {
        let mut config = {
            let _lock = crate::config::helpers::tests::ENV_LOCK.lock();
            Config::resolve(&Settings::default()).unwrap()
        };
        config.bot_username = "me".to_string();
        config.agent.dry_run = dry_run;
        config
    }

    async fn agent(llm: &str) -> (Agent, Arc<StubPlatform>, Arc<dyn Database>, tempfile::TempDir) {
        let (db, dir) = test_db().await;
        let platform = Arc::new(StubPlatform::new());
        let agent = Agent::new(
            &test_config(false),
            AgentDeps {
                store: db.clone(),
                llm: Arc::new(StubLlm::new(llm)),
                platform: platform.clone(),
            },
        )
        .unwrap();
        (agent, platform, db, dir)
    }

    #[tokio::test]
    async fn initialize_bootstraps_missing_profile() {
        let (agent, platform, db, _dir) = agent(ANALYSIS).await;
        platform.set_user_posts(vec![post("hello world!"), post("rust is fun lol")]);
        platform.set_user_likes(vec![post("nice benchmark")]);

        let me = agent.initialize().await.unwrap();
        assert_eq!(me.username, "me");

        let profile = db.get_profile().await.unwrap().unwrap();
        assert_eq!(profile.source, ProfileSource::Blended);
        assert_eq!(db.count_records(Some(RecordKind::Post)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn initialize_keeps_existing_profile() {
        let (agent, platform, db, _dir) = agent(ANALYSIS).await;
        db.save_profile(&PersonalityProfile::neutral()).await.unwrap();
        agent.initialize().await.unwrap();
        assert_eq!(platform.reads(), 0);
        assert_eq!(
            db.get_profile().await.unwrap().unwrap().source,
            ProfileSource::Neutral
        );
    }

    #[tokio::test]
    async fn run_processes_until_shutdown() {
        let (agent, platform, db, _dir) = agent("Totally agree, which version?").await;
        let question = post("What is your favorite Rust crate for async? Great question for the community!");
        let question_id = question.id.clone();
        platform.set_mentions(vec![question]);
        platform.set_user_posts(vec![post("shipped it")]);

        agent
            .run(tokio::time::sleep(Duration::from_millis(500)))
            .await
            .unwrap();

        assert!(db.is_processed(&question_id).await.unwrap());
        assert_eq!(platform.replies().len(), 1);
        // The first maintenance tick refreshed recent history.
        assert_eq!(db.count_records(Some(RecordKind::Post)).await.unwrap(), 1);
        assert_eq!(platform.replies()[0].0, question_id);
    }

    #[tokio::test]
    async fn cleanup_uses_retention() {
        let (agent, _platform, _db, _dir) = agent(ANALYSIS).await;
        let stats = agent.cleanup().await.unwrap();
        assert_eq!(stats, CleanupStats::default());
    }

    #[tokio::test]
    async fn refresh_history_stores_recent_posts_and_likes() {
        let (agent, platform, db, _dir) = agent(ANALYSIS).await;
        platform.set_user_posts(vec![post("new post")]);
        platform.set_user_likes(vec![post("liked one"), post("liked two")]);

        assert_eq!(agent.refresh_history().await.unwrap(), 3);
        assert_eq!(db.count_records(Some(RecordKind::Like)).await.unwrap(), 2);
    }
}
