//! Command-line interface.
//!
//! `run` and `analyze` talk to the platform and the model and need full
//! credentials. The rest only read or maintain the local database.

mod status;

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::agent::{Agent, AgentDeps};
use crate::config::Config;
use crate::db::{Database, InteractionStore, ProfileStore};
use crate::db::libsql::LibSqlBackend;
use crate::decision::DecisionEngine;
use crate::llm::create_llm_provider;
use crate::platform::{Post, PublicMetrics, User, XClient};
use crate::retry::RetryPolicy;
use crate::safety::ContentFilter;

pub use status::run_status_command;

#[derive(Parser, Debug)]
#[command(name = "personabot", version, about = "Social media agent that engages in your voice")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the agent loop (default)
    Run,

    /// Collect history and rebuild the personality profile
    Analyze,

    /// Show the active personality profile
    Profile,

    /// Score a piece of text as if it appeared on the timeline
    Score {
        /// Post text to evaluate
        text: String,

        /// Author username for the hypothetical post
        #[arg(long, default_value = "someone")]
        author: String,

        /// Author follower count
        #[arg(long)]
        followers: Option<u64>,
    },

    /// Show configuration, stored data, and quota usage
    Status,

    /// Delete processed markers and interaction log entries past retention
    Cleanup {
        /// Retention in days (defaults to RETENTION_DAYS)
        #[arg(long)]
        days: Option<u32>,
    },
}

/// Open the configured database and apply the schema.
pub(crate) async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Database>> {
    let backend = LibSqlBackend::new_local(&config.database.libsql_path).await?;
    backend.run_migrations().await?;
    Ok(Arc::new(backend))
}

async fn build_agent(config: &Config) -> anyhow::Result<Agent> {
    config.validate()?;
    let store = open_store(config).await?;
    let llm = create_llm_provider(&config.llm)?;
    let platform = Arc::new(XClient::new(&config.platform, RetryPolicy::default())?);
    Ok(Agent::new(
        config,
        AgentDeps {
            store,
            llm,
            platform,
        },
    )?)
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C received, shutting down..."),
        _ = terminate => tracing::info!("SIGTERM received, shutting down..."),
    }
}

/// Dispatch a parsed command.
pub async fn run_command(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Run => {
            let agent = build_agent(&config).await?;
            agent.initialize().await?;
            agent.run(shutdown_signal()).await?;
        }
        Command::Analyze => {
            let agent = build_agent(&config).await?;
            let profile = agent.analyze_personality().await?;
            print!("{}", profile.render());
        }
        Command::Profile => {
            let store = open_store(&config).await?;
            match store.get_profile().await? {
                Some(profile) => print!("{}", profile.render()),
                None => println!("No personality profile yet. Run `personabot analyze`."),
            }
        }
        Command::Score {
            text,
            author,
            followers,
        } => {
            let store = open_store(&config).await?;
            let profile = store.get_profile().await?;
            let filter = Arc::new(ContentFilter::new(&config.safety_config())?);
            let engine = DecisionEngine::new(
                config.scoring_config()?,
                config.thresholds,
                filter,
                config.bot_username.clone(),
                config.content.avoid_controversial,
            );
            let post = Post {
                id: "cli".to_string(),
                text,
                author: User {
                    id: "cli".to_string(),
                    username: author.trim_start_matches('@').to_string(),
                    name: author,
                    description: String::new(),
                    followers_count: followers,
                },
                created_at: Utc::now(),
                metrics: PublicMetrics::default(),
                topics: Vec::new(),
            };
            if profile.is_none() {
                eprintln!("No personality profile yet; scoring with neutral defaults.");
            }
            let decision = engine.decide(&post, profile.as_ref());
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Status => run_status_command(&config).await?,
        Command::Cleanup { days } => {
            let store = open_store(&config).await?;
            let days = days.unwrap_or(config.agent.retention_days);
            let stats = store.cleanup_older_than(days).await?;
            println!(
                "Removed {} processed markers and {} log entries older than {} days.",
                stats.processed_posts, stats.interactions, days
            );
        }
    }
    Ok(())
}
