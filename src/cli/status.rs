//! Status CLI command.
//!
//! Reports configuration, stored history, the active profile, and quota
//! usage. Works offline: only the local database is touched.

use crate::cli::open_store;
use crate::collector::RecordKind;
use crate::config::Config;
use crate::db::{InteractionStore, ProfileStore, UserDataStore};
use crate::decision::Action;
use crate::ratelimit::RateLimiter;

/// Run the status command, printing agent state.
pub async fn run_status_command(config: &Config) -> anyhow::Result<()> {
    println!("personabot status");
    println!("=================\n");

    println!(
        "  Version:      {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "  Account:      {}",
        if config.bot_username.is_empty() {
            "not configured".to_string()
        } else {
            format!("@{}", config.bot_username)
        }
    );
    println!(
        "  Credentials:  platform {}, model {}",
        if config.platform.access_token.is_some() { "set" } else { "missing" },
        if config.llm.api_key.is_some() { "key set" } else { "no key" },
    );
    println!("  Model:        {} ({})", config.llm.model, config.llm.base_url);
    println!(
        "  Mode:         {}{}",
        if config.agent.dry_run { "dry run" } else { "live" },
        if config.agent.lite_mode { ", lite" } else { "" }
    );

    let path = &config.database.libsql_path;
    print!("  Database:     ");
    if !path.exists() {
        println!("not created yet ({})", path.display());
        return Ok(());
    }
    println!("libSQL ({})", path.display());

    let store = open_store(config).await?;

    let posts = store.count_records(Some(RecordKind::Post)).await?;
    let likes = store.count_records(Some(RecordKind::Like)).await?;
    println!("  History:      {posts} posts, {likes} likes");

    print!("  Profile:      ");
    match store.get_profile().await? {
        Some(profile) => println!(
            "{} ({} records, mean confidence {:.2}, {})",
            profile.source.as_str(),
            profile.sample_size,
            profile.mean_confidence(),
            profile.created_at.format("%Y-%m-%d %H:%M UTC")
        ),
        None => println!("none (run `personabot analyze`)"),
    }

    let recent = store.recent_interactions(24).await?;
    let failed = recent.iter().filter(|r| !r.success).count();
    println!(
        "  Last 24h:     {} interactions ({} failed)",
        recent.len(),
        failed
    );

    let limiter = RateLimiter::new(store.clone(), config.quota);
    print!("  Last hour:    ");
    let mut usage = Vec::new();
    for action in Action::ALL {
        usage.push(format!(
            "{} {}/{}",
            action,
            limiter.used(action).await?,
            limiter.quota().for_action(action)
        ));
    }
    println!("{}", usage.join(", "));

    Ok(())
}
