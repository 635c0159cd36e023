//! SQLite-dialect schema for the libSQL backend.
//!
//! Applied on every start; idempotent via `IF NOT EXISTS`.
//!
//! Type conventions:
//! - timestamps -> `TEXT` (RFC 3339, UTC, millisecond precision, so they sort
//!   lexicographically)
//! - JSON -> `TEXT`
//! - booleans -> `INTEGER` 0/1

pub const SCHEMA: &str = r#"

-- ==================== Personality profile ====================
-- One row per dimension; the whole set is replaced on save.

CREATE TABLE IF NOT EXISTS personality_profile (
    dimension TEXT PRIMARY KEY,
    score REAL NOT NULL,
    confidence REAL NOT NULL,
    source TEXT NOT NULL,
    sample_size INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

-- ==================== Collected history ====================

CREATE TABLE IF NOT EXISTS user_data (
    post_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    collected_at TEXT NOT NULL,
    PRIMARY KEY (post_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_user_data_kind_created ON user_data(kind, created_at);

-- ==================== Processed posts ====================

CREATE TABLE IF NOT EXISTS processed_posts (
    post_id TEXT PRIMARY KEY,
    actions TEXT NOT NULL DEFAULT '[]',
    engagement_score REAL NOT NULL DEFAULT 0,
    confidence REAL NOT NULL DEFAULT 0,
    processed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_processed_posts_at ON processed_posts(processed_at);

-- ==================== Interaction log ====================

CREATE TABLE IF NOT EXISTS interaction_log (
    id TEXT PRIMARY KEY,
    post_id TEXT NOT NULL,
    action TEXT NOT NULL,
    content TEXT,
    reasoning TEXT NOT NULL DEFAULT '',
    success INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_interaction_log_action_created
    ON interaction_log(action, created_at);

"#;
