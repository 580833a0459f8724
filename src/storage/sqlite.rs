//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawl::{CrawlRun, TypeValidity};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{InventoryEntry, LockRecord, RunRecord, RunStatus};
use crate::validation::ValidationError;
use crate::SitelintError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(SitelintError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, SitelintError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, SitelintError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                .unwrap_or(RunStatus::Running),
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![run_id], Self::row_to_run)
            .map_err(|_| StorageError::RunNotFound(run_id))?;

        Ok(run)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt.query_row([], Self::row_to_run).optional()?;

        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    // ===== Aggregate Snapshots =====

    fn save_snapshot(&mut self, run_id: i64, run: &CrawlRun) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "UPDATE runs SET urls_processed = ?1, total_errors = ?2 WHERE id = ?3",
            params![run.urls_processed as i64, run.total_errors as i64, run_id],
        )?;

        // Replace child rows wholesale; checkpoints overwrite prior ones
        tx.execute(
            "DELETE FROM run_validity WHERE run_id = ?1",
            params![run_id],
        )?;
        for (content_type, validity) in &run.validity_by_type {
            tx.execute(
                "INSERT INTO run_validity (run_id, content_type, valid_count, invalid_count)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    run_id,
                    content_type,
                    validity.valid_count as i64,
                    validity.invalid_count as i64
                ],
            )?;
        }

        tx.execute("DELETE FROM run_errors WHERE run_id = ?1", params![run_id])?;
        for (order, error) in run.unaccepted_errors.iter().enumerate() {
            tx.execute(
                "INSERT INTO run_errors (run_id, code, message, node_name, seen_order)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run_id, error.code, error.message, error.node_name, order as i64],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn load_snapshot(&self, run_id: i64) -> StorageResult<CrawlRun> {
        let (started_at, urls_processed, total_errors): (String, i64, i64) = self
            .conn
            .query_row(
                "SELECT started_at, urls_processed, total_errors FROM runs WHERE id = ?1",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|_| StorageError::RunNotFound(run_id))?;

        let mut validity_by_type = HashMap::new();
        let mut stmt = self.conn.prepare(
            "SELECT content_type, valid_count, invalid_count FROM run_validity WHERE run_id = ?1",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (content_type, valid, invalid) = row?;
            validity_by_type.insert(
                content_type,
                TypeValidity {
                    valid_count: valid as u64,
                    invalid_count: invalid as u64,
                },
            );
        }

        let mut stmt = self.conn.prepare(
            "SELECT code, message, node_name FROM run_errors WHERE run_id = ?1 ORDER BY seen_order",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(ValidationError {
                code: row.get(0)?,
                message: row.get(1)?,
                node_name: row.get(2)?,
                accepted: false,
            })
        })?;
        let unaccepted_errors = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(CrawlRun {
            started_at,
            urls_processed: urls_processed as u64,
            total_errors: total_errors as u64,
            unaccepted_errors,
            validity_by_type,
        })
    }

    // ===== Content Inventory =====

    fn upsert_url(&mut self, url: &str, content_type: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO inventory (url, content_type, added_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET content_type = excluded.content_type",
            params![url, content_type, now],
        )?;
        Ok(())
    }

    fn list_due_urls(
        &self,
        now: i64,
        stale_after_secs: u64,
        limit: usize,
    ) -> StorageResult<Vec<InventoryEntry>> {
        let cutoff = now - stale_after_secs as i64;
        let mut stmt = self.conn.prepare(
            "SELECT url, content_type FROM inventory
             WHERE last_valid IS NULL OR last_valid = 0 OR last_validated_at <= ?1
             ORDER BY last_validated_at ASC NULLS FIRST, url ASC
             LIMIT ?2",
        )?;

        let entries = stmt
            .query_map(params![cutoff, limit as i64], |row| {
                Ok(InventoryEntry {
                    url: row.get(0)?,
                    content_type: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn mark_validated(&mut self, url: &str, valid: bool, now: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE inventory SET last_validated_at = ?1, last_valid = ?2 WHERE url = ?3",
            params![now, valid as i64, url],
        )?;
        Ok(())
    }

    fn count_inventory(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM inventory", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Crawl Lock =====

    fn try_acquire_lock(
        &mut self,
        token: &str,
        now: i64,
        timeout_secs: u64,
    ) -> StorageResult<bool> {
        let expires_at = now + timeout_secs as i64;

        // One conditional upsert: insert the row, or steal it only when the
        // previous holder's lease has expired. changes() tells us which.
        let changed = self.conn.execute(
            "INSERT INTO crawl_lock (id, token, acquired_at, expires_at) VALUES (1, ?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 token = excluded.token,
                 acquired_at = excluded.acquired_at,
                 expires_at = excluded.expires_at
             WHERE crawl_lock.expires_at <= excluded.acquired_at",
            params![token, now, expires_at],
        )?;

        Ok(changed == 1)
    }

    fn release_lock(&mut self, token: &str) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM crawl_lock WHERE id = 1 AND token = ?1",
            params![token],
        )?;
        Ok(())
    }

    fn force_release_lock(&mut self) -> StorageResult<()> {
        self.conn.execute("DELETE FROM crawl_lock WHERE id = 1", [])?;
        Ok(())
    }

    fn get_lock(&self) -> StorageResult<Option<LockRecord>> {
        let lock = self
            .conn
            .query_row(
                "SELECT token, acquired_at, expires_at FROM crawl_lock WHERE id = 1",
                [],
                |row| {
                    Ok(LockRecord {
                        token: row.get(0)?,
                        acquired_at: row.get(1)?,
                        expires_at: row.get(2)?,
                    })
                },
            )
            .optional()?;

        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    fn storage() -> SqliteStorage {
        SqliteStorage::new_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_run() {
        let mut storage = storage();
        let run_id = storage.create_run("hash123").unwrap();

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.id, run_id);
        assert_eq!(run.config_hash, "hash123");
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_get_run_not_found() {
        let storage = storage();
        assert!(matches!(
            storage.get_run(42),
            Err(StorageError::RunNotFound(42))
        ));
    }

    #[test]
    fn test_latest_run() {
        let mut storage = storage();
        assert!(storage.get_latest_run().unwrap().is_none());

        storage.create_run("first").unwrap();
        let second = storage.create_run("second").unwrap();

        let latest = storage.get_latest_run().unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.config_hash, "second");
    }

    #[test]
    fn test_finish_run() {
        let mut storage = storage();
        let run_id = storage.create_run("hash").unwrap();

        storage.finish_run(run_id, RunStatus::Aborted).unwrap();

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Aborted);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut storage = storage();
        let run_id = storage.create_run("hash").unwrap();

        let mut validity_by_type = HashMap::new();
        validity_by_type.insert(
            "post".to_string(),
            TypeValidity {
                valid_count: 3,
                invalid_count: 2,
            },
        );

        let run = CrawlRun {
            started_at: Utc::now().to_rfc3339(),
            urls_processed: 5,
            total_errors: 7,
            unaccepted_errors: vec![
                ValidationError::new("disallowed-tag", "tag not allowed"),
                ValidationError::new("invalid-layout", "bad layout").with_node_name("img"),
            ],
            validity_by_type,
        };

        storage.save_snapshot(run_id, &run).unwrap();
        let loaded = storage.load_snapshot(run_id).unwrap();

        assert_eq!(loaded.urls_processed, 5);
        assert_eq!(loaded.total_errors, 7);
        assert_eq!(loaded.unaccepted_errors.len(), 2);
        assert_eq!(loaded.unaccepted_errors[0].code, "disallowed-tag");
        assert_eq!(
            loaded.unaccepted_errors[1].node_name.as_deref(),
            Some("img")
        );
        assert_eq!(loaded.validity_by_type["post"].valid_count, 3);
        assert_eq!(loaded.validity_by_type["post"].invalid_count, 2);
    }

    #[test]
    fn test_snapshot_checkpoint_overwrites() {
        let mut storage = storage();
        let run_id = storage.create_run("hash").unwrap();

        let mut run = CrawlRun {
            started_at: Utc::now().to_rfc3339(),
            urls_processed: 1,
            total_errors: 1,
            unaccepted_errors: vec![ValidationError::new("a", "first")],
            validity_by_type: HashMap::new(),
        };
        storage.save_snapshot(run_id, &run).unwrap();

        run.urls_processed = 2;
        run.unaccepted_errors.push(ValidationError::new("b", "second"));
        storage.save_snapshot(run_id, &run).unwrap();

        let loaded = storage.load_snapshot(run_id).unwrap();
        assert_eq!(loaded.urls_processed, 2);
        assert_eq!(loaded.unaccepted_errors.len(), 2);
        assert_eq!(loaded.unaccepted_errors[1].code, "b");
    }

    #[test]
    fn test_inventory_upsert_and_due() {
        let mut storage = storage();
        storage.upsert_url("https://example.com/a", "post").unwrap();
        storage.upsert_url("https://example.com/b", "page").unwrap();

        // Upsert of an existing URL updates its type without duplicating
        storage.upsert_url("https://example.com/a", "page").unwrap();
        assert_eq!(storage.count_inventory().unwrap(), 2);

        let due = storage.list_due_urls(1_000_000, 3600, 10).unwrap();
        assert_eq!(due.len(), 2);
    }

    #[test]
    fn test_fresh_valid_urls_excluded() {
        let mut storage = storage();
        let now = 1_000_000i64;
        storage.upsert_url("https://example.com/a", "post").unwrap();
        storage.upsert_url("https://example.com/b", "post").unwrap();

        // a validated valid just now, b validated invalid just now
        storage.mark_validated("https://example.com/a", true, now).unwrap();
        storage.mark_validated("https://example.com/b", false, now).unwrap();

        let due = storage.list_due_urls(now, 3600, 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].url, "https://example.com/b");

        // Once the freshness window passes, a is due again
        let due = storage.list_due_urls(now + 3601, 3600, 10).unwrap();
        assert_eq!(due.len(), 2);
    }

    #[test]
    fn test_due_limit() {
        let mut storage = storage();
        for i in 0..5 {
            storage
                .upsert_url(&format!("https://example.com/{}", i), "post")
                .unwrap();
        }

        let due = storage.list_due_urls(1_000_000, 3600, 3).unwrap();
        assert_eq!(due.len(), 3);
    }

    #[test]
    fn test_lock_acquire_and_contention() {
        let mut storage = storage();
        let now = 1_000_000i64;

        assert!(storage.try_acquire_lock("owner-1", now, 900).unwrap());

        // Unexpired lock blocks a second acquisition
        assert!(!storage.try_acquire_lock("owner-2", now + 10, 900).unwrap());

        let lock = storage.get_lock().unwrap().unwrap();
        assert_eq!(lock.token, "owner-1");
        assert!(lock.is_active(now + 10));
    }

    #[test]
    fn test_expired_lock_reacquired() {
        let mut storage = storage();
        let now = 1_000_000i64;

        assert!(storage.try_acquire_lock("owner-1", now, 900).unwrap());

        // After the timeout elapses, the lock is treated as abandoned
        assert!(storage
            .try_acquire_lock("owner-2", now + 900, 900)
            .unwrap());

        let lock = storage.get_lock().unwrap().unwrap();
        assert_eq!(lock.token, "owner-2");
    }

    #[test]
    fn test_release_requires_owner_token() {
        let mut storage = storage();
        let now = 1_000_000i64;

        assert!(storage.try_acquire_lock("owner-1", now, 900).unwrap());

        // Mismatched token is a no-op
        storage.release_lock("owner-2").unwrap();
        assert!(storage.get_lock().unwrap().is_some());

        storage.release_lock("owner-1").unwrap();
        assert!(storage.get_lock().unwrap().is_none());
    }

    #[test]
    fn test_force_release() {
        let mut storage = storage();
        assert!(storage.try_acquire_lock("owner-1", 1_000_000, 900).unwrap());

        storage.force_release_lock().unwrap();
        assert!(storage.get_lock().unwrap().is_none());
    }
}
