//! SQL migration definitions for the Pagewatch database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed within a transaction.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: targets, snapshots",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Monitored targets (the registry)
CREATE TABLE IF NOT EXISTS targets (
    id              TEXT PRIMARY KEY,
    url             TEXT NOT NULL,
    name            TEXT,
    owner_email     TEXT NOT NULL,
    frequency_hours INTEGER NOT NULL DEFAULT 24,
    status          TEXT NOT NULL DEFAULT 'active',
    last_checked    TEXT,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_targets_status ON targets(status);

-- Observed content states, append-only per target
CREATE TABLE IF NOT EXISTS snapshots (
    id               TEXT PRIMARY KEY,
    target_id        TEXT NOT NULL REFERENCES targets(id) ON DELETE CASCADE,
    content_hash     TEXT NOT NULL,
    clean_content    TEXT NOT NULL,
    summary          TEXT NOT NULL,
    diff_description TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_target ON snapshots(target_id, created_at DESC);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
