//! SQL migration definitions for the Prospector resume store.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as a batch.

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
        description: "Initial schema: enrichment_records",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One terminal outcome per company URL, for batch resume
CREATE TABLE IF NOT EXISTS enrichment_records (
    url           TEXT PRIMARY KEY,
    status        TEXT NOT NULL CHECK (status IN ('success', 'error')),
    error_message TEXT,
    result_json   TEXT,
    created_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_status ON enrichment_records(status);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
