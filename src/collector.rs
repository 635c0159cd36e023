//! Collects the user's own posts and likes from the platform.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::Error;
use crate::platform::types::{Post, User};
use crate::platform::SocialPlatform;

/// Posts fetched by `update_recent`.
const RECENT_POSTS: usize = 50;
/// Likes fetched by `update_recent`.
const RECENT_LIKES: usize = 25;

/// Whether a record is something the user wrote or something they liked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Post,
    Like,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Post => "post",
            RecordKind::Like => "like",
        }
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" | "tweet" => Ok(RecordKind::Post),
            "like" => Ok(RecordKind::Like),
            other => Err(format!("unknown record kind '{other}'")),
        }
    }
}

/// One normalized post or like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub post_id: String,
    pub content: String,
    pub kind: RecordKind,
    pub timestamp: DateTime<Utc>,
    /// Author, metrics and topic labels as JSON.
    pub metadata: serde_json::Value,
}

impl UserRecord {
    pub fn from_post(post: &Post, kind: RecordKind) -> Self {
        Self {
            post_id: post.id.clone(),
            content: post.text.clone(),
            kind,
            timestamp: post.created_at,
            metadata: serde_json::json!({
                "author": post.author.username,
                "metrics": post.metrics,
                "topics": post.topics,
            }),
        }
    }
}

/// Everything collected for one user.
#[derive(Debug, Clone)]
pub struct CollectedData {
    pub user: User,
    pub records: Vec<UserRecord>,
}

impl CollectedData {
    pub fn total_interactions(&self) -> usize {
        self.records.len()
    }

    pub fn posts(&self) -> impl Iterator<Item = &UserRecord> {
        self.records.iter().filter(|r| r.kind == RecordKind::Post)
    }

    pub fn likes(&self) -> impl Iterator<Item = &UserRecord> {
        self.records.iter().filter(|r| r.kind == RecordKind::Like)
    }
}

/// Pulls history from the platform and stores it.
pub struct Collector {
    platform: Arc<dyn SocialPlatform>,
    store: Arc<dyn Database>,
    post_window: usize,
}

impl Collector {
    pub fn new(platform: Arc<dyn SocialPlatform>, store: Arc<dyn Database>, post_window: usize) -> Self {
        Self {
            platform,
            store,
            post_window,
        }
    }

    /// Fetch the full history window: `post_window` posts and half as many likes.
    pub async fn collect_all(&self, username: &str) -> Result<CollectedData, Error> {
        self.collect(username, self.post_window, self.post_window / 2)
            .await
    }

    /// Fetch only the most recent posts and likes.
    pub async fn update_recent(&self, username: &str) -> Result<CollectedData, Error> {
        self.collect(username, RECENT_POSTS, RECENT_LIKES).await
    }

    async fn collect(&self, username: &str, posts: usize, likes: usize) -> Result<CollectedData, Error> {
        let user = self.platform.get_user(username).await?;
        tracing::info!(username = %user.username, posts, likes, "Collecting user history");

        let own = self.platform.user_posts(&user.id, posts).await?;
        let liked = self.platform.user_likes(&user.id, likes).await?;

        let records: Vec<UserRecord> = own
            .iter()
            .map(|p| UserRecord::from_post(p, RecordKind::Post))
            .chain(liked.iter().map(|p| UserRecord::from_post(p, RecordKind::Like)))
            .collect();

        let stored = self.store.upsert_records(&records).await?;
        tracing::info!(
            posts = own.len(),
            likes = liked.len(),
            stored,
            "Collected user history"
        );

        Ok(CollectedData { user, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserDataStore;
    use crate::error::PlatformError;
    use crate::testing::{StubPlatform, post, test_db};

    #[test]
    fn record_from_post_keeps_metadata() {
        let mut p = post("hello world");
        p.metrics.like_count = 12;
        p.topics = vec!["Rust".to_string()];
        let r = UserRecord::from_post(&p, RecordKind::Like);
        assert_eq!(r.kind, RecordKind::Like);
        assert_eq!(r.content, "hello world");
        assert_eq!(r.metadata["metrics"]["like_count"], 12);
        assert_eq!(r.metadata["topics"][0], "Rust");
    }

    #[test]
    fn record_kind_parses() {
        assert_eq!("post".parse::<RecordKind>().unwrap(), RecordKind::Post);
        assert_eq!("like".parse::<RecordKind>().unwrap(), RecordKind::Like);
        assert!("bookmark".parse::<RecordKind>().is_err());
    }

    #[tokio::test]
    async fn collect_all_uses_window_and_persists() {
        let (db, _dir) = test_db().await;
        let platform = Arc::new(StubPlatform::new());
        platform.set_user_posts((0..30).map(|i| post(&format!("post {i}"))).collect());
        platform.set_user_likes((0..30).map(|i| post(&format!("like {i}"))).collect());

        let collector = Collector::new(platform.clone(), db.clone(), 20);
        let data = collector.collect_all("jane").await.unwrap();

        assert_eq!(data.posts().count(), 20);
        assert_eq!(data.likes().count(), 10);
        assert_eq!(data.total_interactions(), 30);
        assert_eq!(db.count_records(None).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn update_recent_fetches_small_window() {
        let (db, _dir) = test_db().await;
        let platform = Arc::new(StubPlatform::new());
        platform.set_user_posts((0..100).map(|i| post(&format!("post {i}"))).collect());
        platform.set_user_likes((0..100).map(|i| post(&format!("like {i}"))).collect());

        let collector = Collector::new(platform, db, 1000);
        let data = collector.update_recent("jane").await.unwrap();
        assert_eq!(data.posts().count(), 50);
        assert_eq!(data.likes().count(), 25);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (db, _dir) = test_db().await;
        let platform = Arc::new(StubPlatform::new());
        platform.set_missing_user();
        let collector = Collector::new(platform, db, 10);
        let err = collector.collect_all("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Platform(PlatformError::NotFound { .. })
        ));
    }
}
