//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the sitelint database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs with their aggregate counters
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    urls_processed INTEGER NOT NULL DEFAULT 0,
    total_errors INTEGER NOT NULL DEFAULT 0
);

-- Per-content-type validity counts of a run
CREATE TABLE IF NOT EXISTS run_validity (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    content_type TEXT NOT NULL,
    valid_count INTEGER NOT NULL DEFAULT 0,
    invalid_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE(run_id, content_type)
);

CREATE INDEX IF NOT EXISTS idx_run_validity_run ON run_validity(run_id);

-- Distinct unaccepted error codes seen during a run, in first-seen order
CREATE TABLE IF NOT EXISTS run_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    code TEXT NOT NULL,
    message TEXT NOT NULL,
    node_name TEXT,
    seen_order INTEGER NOT NULL,
    UNIQUE(run_id, code)
);

CREATE INDEX IF NOT EXISTS idx_run_errors_run ON run_errors(run_id);

-- Content inventory: every URL the crawler may validate
CREATE TABLE IF NOT EXISTS inventory (
    url TEXT PRIMARY KEY,
    content_type TEXT NOT NULL,
    added_at TEXT NOT NULL,
    last_validated_at INTEGER,
    last_valid INTEGER
);

CREATE INDEX IF NOT EXISTS idx_inventory_type ON inventory(content_type);
CREATE INDEX IF NOT EXISTS idx_inventory_validated ON inventory(last_validated_at);

-- Single-row crawl lock; acquisition is a conditional upsert on this row
CREATE TABLE IF NOT EXISTS crawl_lock (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    token TEXT NOT NULL,
    acquired_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
