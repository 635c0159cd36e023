//! Persistence.
//!
//! Storage is split into per-concern traits so components can depend on just
//! the slice they use; [`Database`] bundles them for the one backend,
//! [`libsql::LibSqlBackend`].

pub mod libsql;
mod libsql_migrations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::collector::{RecordKind, UserRecord};
use crate::decision::{Action, Decision};
use crate::error::DatabaseError;
use crate::profile::PersonalityProfile;

/// One executed (or attempted) action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionRecord {
    pub id: Uuid,
    pub post_id: String,
    pub action: Action,
    /// Reply text for replies.
    pub content: Option<String>,
    pub reasoning: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(post_id: impl Into<String>, action: Action, reasoning: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            post_id: post_id.into(),
            action,
            content: None,
            reasoning: reasoning.into(),
            success: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Rows removed by a cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub processed_posts: u64,
    pub interactions: u64,
}

/// The active personality profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Replace the active profile.
    async fn save_profile(&self, profile: &PersonalityProfile) -> Result<(), DatabaseError>;

    async fn get_profile(&self) -> Result<Option<PersonalityProfile>, DatabaseError>;
}

/// The user's collected posts and likes.
#[async_trait]
pub trait UserDataStore: Send + Sync {
    /// Insert or refresh records, keyed by post id and kind.
    async fn upsert_records(&self, records: &[UserRecord]) -> Result<usize, DatabaseError>;

    /// Count stored records, optionally of one kind.
    async fn count_records(&self, kind: Option<RecordKind>) -> Result<u64, DatabaseError>;

    /// Most recent records of one kind, newest first.
    async fn recent_records(
        &self,
        kind: RecordKind,
        limit: usize,
    ) -> Result<Vec<UserRecord>, DatabaseError>;
}

/// Processed-post bookkeeping and the interaction log.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn is_processed(&self, post_id: &str) -> Result<bool, DatabaseError>;

    /// Record that a post was evaluated. Idempotent.
    async fn mark_processed(&self, post_id: &str, decision: &Decision) -> Result<(), DatabaseError>;

    async fn log_interaction(&self, record: &InteractionRecord) -> Result<(), DatabaseError>;

    /// Interactions from the last `hours` hours, newest first.
    async fn recent_interactions(&self, hours: u32) -> Result<Vec<InteractionRecord>, DatabaseError>;

    /// Successful interactions of one action since `since`.
    async fn count_actions_since(
        &self,
        action: Action,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    /// Delete processed markers and log entries older than `days`.
    async fn cleanup_older_than(&self, days: u32) -> Result<CleanupStats, DatabaseError>;
}

/// Everything the agent persists.
#[async_trait]
pub trait Database: ProfileStore + UserDataStore + InteractionStore + Send + Sync {
    /// Create tables if missing. Idempotent.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}
