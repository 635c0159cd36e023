//! UserDataStore implementation for LibSqlBackend.

use async_trait::async_trait;
use chrono::Utc;
use libsql::params;

use crate::collector::{RecordKind, UserRecord};
use crate::db::UserDataStore;
use crate::db::libsql::{LibSqlBackend, fmt_ts, get_text, get_ts};
use crate::error::DatabaseError;

/// Column order: post_id(0), kind(1), content(2), created_at(3), metadata(4).
fn row_to_record(row: &libsql::Row) -> Result<UserRecord, DatabaseError> {
    let kind = get_text(row, 1)
        .parse::<RecordKind>()
        .map_err(DatabaseError::Serialization)?;
    let metadata = serde_json::from_str(&get_text(row, 4))
        .map_err(|e| DatabaseError::Serialization(format!("invalid record metadata: {e}")))?;
    Ok(UserRecord {
        post_id: get_text(row, 0),
        content: get_text(row, 2),
        kind,
        timestamp: get_ts(row, 3),
        metadata,
    })
}

#[async_trait]
impl UserDataStore for LibSqlBackend {
    async fn upsert_records(&self, records: &[UserRecord]) -> Result<usize, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }
        let conn = self.connect().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let collected_at = fmt_ts(Utc::now());

        let mut written = 0usize;
        for record in records {
            let metadata = serde_json::to_string(&record.metadata)
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
            written += tx
                .execute(
                    "INSERT INTO user_data (post_id, kind, content, created_at, metadata, collected_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(post_id, kind) DO UPDATE SET \
                        content = excluded.content, \
                        metadata = excluded.metadata, \
                        collected_at = excluded.collected_at",
                    params![
                        record.post_id.as_str(),
                        record.kind.as_str(),
                        record.content.as_str(),
                        fmt_ts(record.timestamp),
                        metadata,
                        collected_at.as_str()
                    ],
                )
                .await
                .map_err(|e| DatabaseError::Query(e.to_string()))? as usize;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(written)
    }

    async fn count_records(&self, kind: Option<RecordKind>) -> Result<u64, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = match kind {
            Some(kind) => {
                conn.query(
                    "SELECT COUNT(*) FROM user_data WHERE kind = ?1",
                    params![kind.as_str()],
                )
                .await
            }
            None => conn.query("SELECT COUNT(*) FROM user_data", params![]).await,
        }
        .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let count = match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            Some(row) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(e.to_string()))?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn recent_records(
        &self,
        kind: RecordKind,
        limit: usize,
    ) -> Result<Vec<UserRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                "SELECT post_id, kind, content, created_at, metadata FROM user_data \
                 WHERE kind = ?1 ORDER BY created_at DESC LIMIT ?2",
                params![kind.as_str(), limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?
        {
            out.push(row_to_record(&row)?);
        }
        Ok(out)
    }
}
