//! libSQL backend over a local database file.
//!
//! Each operation opens its own connection. An in-memory libSQL database is
//! private to the connection that created it, so tests use a file in a
//! temporary directory instead.

mod interactions;
mod profile;
mod user_data;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::db::Database;
use crate::db::libsql_migrations::SCHEMA;
use crate::error::DatabaseError;

/// libSQL-backed store.
#[derive(Clone)]
pub struct LibSqlBackend {
    db: Arc<libsql::Database>,
}

impl LibSqlBackend {
    /// Open (or create) a database file, creating parent directories.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        tracing::debug!(path = %path.display(), "Opened libSQL database");
        Ok(Self { db: Arc::new(db) })
    }

    pub(crate) async fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db
            .connect()
            .map_err(|e| DatabaseError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect().await?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }
}

/// Format a timestamp for storage.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read a text column, treating NULL as empty.
pub(crate) fn get_text(row: &libsql::Row, idx: i32) -> String {
    row.get::<String>(idx).unwrap_or_default()
}

pub(crate) fn get_opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<Option<String>>(idx).ok().flatten()
}

pub(crate) fn get_f64(row: &libsql::Row, idx: i32) -> f64 {
    row.get::<f64>(idx).unwrap_or_default()
}

pub(crate) fn get_i64(row: &libsql::Row, idx: i32) -> i64 {
    row.get::<i64>(idx).unwrap_or_default()
}

/// Read a timestamp column; unparseable values become the Unix epoch.
pub(crate) fn get_ts(row: &libsql::Row, idx: i32) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&get_text(row, idx))
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
