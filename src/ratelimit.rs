//! Per-action hourly quotas.
//!
//! Counts come from the interaction log rather than in-memory counters, so
//! quotas survive restarts and are shared by every command that acts.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::db::InteractionStore;
use crate::decision::Action;
use crate::error::DatabaseError;

/// Maximum successful actions per rolling hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionQuota {
    pub likes_per_hour: u32,
    pub replies_per_hour: u32,
    pub reposts_per_hour: u32,
}

impl Default for ActionQuota {
    fn default() -> Self {
        Self {
            likes_per_hour: 50,
            replies_per_hour: 10,
            reposts_per_hour: 5,
        }
    }
}

impl ActionQuota {
    pub fn for_action(&self, action: Action) -> u32 {
        match action {
            Action::Like => self.likes_per_hour,
            Action::Reply => self.replies_per_hour,
            Action::Repost => self.reposts_per_hour,
        }
    }
}

/// Checks actions against [`ActionQuota`].
pub struct RateLimiter {
    store: Arc<dyn InteractionStore>,
    quota: ActionQuota,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn InteractionStore>, quota: ActionQuota) -> Self {
        Self { store, quota }
    }

    pub fn quota(&self) -> &ActionQuota {
        &self.quota
    }

    /// Whether one more `action` fits in the last hour's budget.
    pub async fn check(&self, action: Action) -> Result<bool, DatabaseError> {
        let limit = u64::from(self.quota.for_action(action));
        let used = self.used(action).await?;
        if used >= limit {
            tracing::debug!(action = %action, used, limit, "Hourly quota reached");
            return Ok(false);
        }
        Ok(true)
    }

    /// Successful actions of this kind in the last hour.
    pub async fn used(&self, action: Action) -> Result<u64, DatabaseError> {
        self.store
            .count_actions_since(action, Utc::now() - Duration::hours(1))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InteractionRecord;
    use crate::testing::test_db;

    #[tokio::test]
    async fn blocks_once_quota_is_used() {
        let (db, _dir) = test_db().await;
        let limiter = RateLimiter::new(
            db.clone(),
            ActionQuota {
                likes_per_hour: 2,
                replies_per_hour: 0,
                reposts_per_hour: 5,
            },
        );

        assert!(limiter.check(Action::Like).await.unwrap());
        db.log_interaction(&InteractionRecord::new("a", Action::Like, "r"))
            .await
            .unwrap();
        assert!(limiter.check(Action::Like).await.unwrap());
        db.log_interaction(&InteractionRecord::new("b", Action::Like, "r"))
            .await
            .unwrap();
        assert!(!limiter.check(Action::Like).await.unwrap());

        assert!(!limiter.check(Action::Reply).await.unwrap());
        assert!(limiter.check(Action::Repost).await.unwrap());
    }

    #[tokio::test]
    async fn failed_actions_do_not_consume_quota() {
        let (db, _dir) = test_db().await;
        let limiter = RateLimiter::new(
            db.clone(),
            ActionQuota {
                likes_per_hour: 1,
                ..Default::default()
            },
        );
        db.log_interaction(&InteractionRecord::new("a", Action::Like, "r").failed())
            .await
            .unwrap();
        assert!(limiter.check(Action::Like).await.unwrap());
        assert_eq!(limiter.used(Action::Like).await.unwrap(), 0);
    }
}
