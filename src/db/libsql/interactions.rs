//! InteractionStore implementation for LibSqlBackend.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use libsql::params;
use uuid::Uuid;

use crate::db::libsql::{LibSqlBackend, fmt_ts, get_i64, get_opt_text, get_text, get_ts};
use crate::db::{CleanupStats, InteractionRecord, InteractionStore};
use crate::decision::{Action, Decision};
use crate::error::DatabaseError;

/// Column order: id(0), post_id(1), action(2), content(3), reasoning(4),
/// success(5), created_at(6).
fn row_to_interaction(row: &libsql::Row) -> Result<InteractionRecord, DatabaseError> {
    let id = get_text(row, 0);
    let action = get_text(row, 2)
        .parse::<Action>()
        .map_err(DatabaseError::Serialization)?;
    Ok(InteractionRecord {
        id: id
            .parse::<Uuid>()
            .map_err(|e| DatabaseError::Serialization(format!("invalid id {id}: {e}")))?,
        post_id: get_text(row, 1),
        action,
        content: get_opt_text(row, 3),
        reasoning: get_text(row, 4),
        success: get_i64(row, 5) != 0,
        created_at: get_ts(row, 6),
    })
}

async fn scalar_count(
    conn: &libsql::Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<u64, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    let count = match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?
    {
        Some(row) => get_i64(&row, 0),
        None => 0,
    };
    Ok(count.max(0) as u64)
}

/// Formatted timestamp `span` before now. Spans reaching past the
/// representable date range are an error rather than a panic.
fn window_start(span: Option<Duration>) -> Result<String, DatabaseError> {
    span.and_then(|span| Utc::now().checked_sub_signed(span))
        .map(fmt_ts)
        .ok_or_else(|| {
            DatabaseError::Query("time window exceeds the supported date range".to_string())
        })
}

#[async_trait]
impl InteractionStore for LibSqlBackend {
    async fn is_processed(&self, post_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let count = scalar_count(
            &conn,
            "SELECT COUNT(*) FROM processed_posts WHERE post_id = ?1",
            params![post_id],
        )
        .await?;
        Ok(count > 0)
    }

    async fn mark_processed(&self, post_id: &str, decision: &Decision) -> Result<(), DatabaseError> {
        let actions = serde_json::to_string(&decision.actions)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO processed_posts (post_id, actions, engagement_score, confidence, processed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(post_id) DO NOTHING",
            params![
                post_id,
                actions,
                decision.engagement_score,
                decision.confidence,
                fmt_ts(Utc::now())
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn log_interaction(&self, record: &InteractionRecord) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            "INSERT INTO interaction_log (id, post_id, action, content, reasoning, success, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                record.post_id.as_str(),
                record.action.as_str(),
                record.content.clone(),
                record.reasoning.as_str(),
                if record.success { 1i64 } else { 0i64 },
                fmt_ts(record.created_at)
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn recent_interactions(&self, hours: u32) -> Result<Vec<InteractionRecord>, DatabaseError> {
        let since = window_start(Duration::try_hours(i64::from(hours)))?;
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT id, post_id, action, content, reasoning, success, created_at \
                 FROM interaction_log WHERE created_at >= ?1 ORDER BY created_at DESC",
                params![since],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            out.push(row_to_interaction(&row)?);
        }
        Ok(out)
    }

    async fn count_actions_since(
        &self,
        action: Action,
        since: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let conn = self.connect().await?;
        scalar_count(
            &conn,
            "SELECT COUNT(*) FROM interaction_log \
             WHERE action = ?1 AND success = 1 AND created_at >= ?2",
            params![action.as_str(), fmt_ts(since)],
        )
        .await
    }

    async fn cleanup_older_than(&self, days: u32) -> Result<CleanupStats, DatabaseError> {
        let cutoff = window_start(Duration::try_days(i64::from(days)))?;
        let conn = self.connect().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let processed_posts = tx
            .execute(
                "DELETE FROM processed_posts WHERE processed_at < ?1",
                params![cutoff.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let interactions = tx
            .execute(
                "DELETE FROM interaction_log WHERE created_at < ?1",
                params![cutoff.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let stats = CleanupStats {
            processed_posts,
            interactions,
        };
        tracing::info!(
            days,
            processed_posts = stats.processed_posts,
            interactions = stats.interactions,
            "Cleaned up old records"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::db::{InteractionRecord, InteractionStore};
    use crate::decision::{Action, Decision};
    use crate::testing::test_db;

    #[tokio::test]
    async fn mark_processed_is_idempotent() {
        let (db, _dir) = test_db().await;
        assert!(!db.is_processed("p1").await.unwrap());

        let mut decision = Decision::ignore("low score");
        db.mark_processed("p1", &decision).await.unwrap();
        decision.actions.insert(Action::Like);
        db.mark_processed("p1", &decision).await.unwrap();

        assert!(db.is_processed("p1").await.unwrap());
        assert!(!db.is_processed("p2").await.unwrap());
    }

    #[tokio::test]
    async fn counts_only_successful_actions_in_window() {
        let (db, _dir) = test_db().await;
        let now = Utc::now();

        db.log_interaction(&InteractionRecord::new("a", Action::Like, "r"))
            .await
            .unwrap();
        db.log_interaction(&InteractionRecord::new("b", Action::Like, "r").failed())
            .await
            .unwrap();
        let mut old = InteractionRecord::new("c", Action::Like, "r");
        old.created_at = now - Duration::hours(2);
        db.log_interaction(&old).await.unwrap();
        db.log_interaction(&InteractionRecord::new("d", Action::Reply, "r").with_content("hi"))
            .await
            .unwrap();

        let since = now - Duration::hours(1);
        assert_eq!(db.count_actions_since(Action::Like, since).await.unwrap(), 1);
        assert_eq!(db.count_actions_since(Action::Reply, since).await.unwrap(), 1);
        assert_eq!(db.count_actions_since(Action::Repost, since).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn recent_interactions_round_trip_fields() {
        let (db, _dir) = test_db().await;
        let record = InteractionRecord::new("p9", Action::Reply, "good fit").with_content("nice");
        db.log_interaction(&record).await.unwrap();

        let recent = db.recent_interactions(24).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, record.id);
        assert_eq!(recent[0].content.as_deref(), Some("nice"));
        assert!(recent[0].success);
    }

    #[tokio::test]
    async fn cleanup_removes_only_old_rows() {
        let (db, _dir) = test_db().await;
        let mut old = InteractionRecord::new("old", Action::Like, "r");
        old.created_at = Utc::now() - Duration::days(100);
        db.log_interaction(&old).await.unwrap();
        db.log_interaction(&InteractionRecord::new("new", Action::Like, "r"))
            .await
            .unwrap();
        db.mark_processed("fresh", &Decision::ignore("x")).await.unwrap();

        let stats = db.cleanup_older_than(90).await.unwrap();
        assert_eq!(stats.interactions, 1);
        assert_eq!(stats.processed_posts, 0);
        assert_eq!(db.recent_interactions(24 * 365).await.unwrap().len(), 1);
        assert!(db.is_processed("fresh").await.unwrap());
    }

    #[tokio::test]
    async fn oversized_windows_are_errors() {
        let (db, _dir) = test_db().await;
        db.mark_processed("keep", &Decision::ignore("x")).await.unwrap();

        let err = db.cleanup_older_than(u32::MAX).await.unwrap_err();
        assert!(matches!(err, crate::error::DatabaseError::Query(_)));
        assert!(db.is_processed("keep").await.unwrap());

        assert!(db.recent_interactions(u32::MAX).await.is_err());
    }
}
