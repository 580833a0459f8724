//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawl::CrawlRun;
use crate::storage::{InventoryEntry, LockRecord, RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the validation
/// crawler: run history, aggregate snapshots, the content inventory, and the
/// crawl lock row.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run in the `running` state
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Finalizes a run with a finish timestamp and terminal status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Aggregate Snapshots =====

    /// Persists the aggregate snapshot of a run
    ///
    /// Called at checkpoints and on completion/abort; replaces any previously
    /// saved snapshot for the run so the call is idempotent.
    fn save_snapshot(&mut self, run_id: i64, run: &CrawlRun) -> StorageResult<()>;

    /// Loads the persisted aggregate snapshot of a run
    fn load_snapshot(&self, run_id: i64) -> StorageResult<CrawlRun>;

    // ===== Content Inventory =====

    /// Inserts a URL into the inventory or updates its content type
    fn upsert_url(&mut self, url: &str, content_type: &str) -> StorageResult<()>;

    /// Lists inventory entries due for validation, oldest-first
    ///
    /// A URL is due unless its last verdict was valid and newer than
    /// `stale_after_secs`. Invalid and never-validated URLs are always due.
    ///
    /// # Arguments
    ///
    /// * `now` - Current time, unix seconds
    /// * `stale_after_secs` - Freshness window for valid verdicts
    /// * `limit` - Maximum number of entries to return
    fn list_due_urls(
        &self,
        now: i64,
        stale_after_secs: u64,
        limit: usize,
    ) -> StorageResult<Vec<InventoryEntry>>;

    /// Records the verdict of a validated URL
    fn mark_validated(&mut self, url: &str, valid: bool, now: i64) -> StorageResult<()>;

    /// Counts all inventory entries
    fn count_inventory(&self) -> StorageResult<u64>;

    // ===== Crawl Lock =====

    /// Atomically takes the crawl lock if no unexpired lock exists
    ///
    /// This must be a single compare-and-set statement against the backing
    /// store, not a read-then-write. An expired lock is treated as absent.
    ///
    /// # Returns
    ///
    /// `true` if the lock was taken, `false` if an unexpired lock is held
    fn try_acquire_lock(&mut self, token: &str, now: i64, timeout_secs: u64)
        -> StorageResult<bool>;

    /// Releases the lock only if `token` matches the current owner.
    /// A stale or mismatched token is a no-op.
    fn release_lock(&mut self, token: &str) -> StorageResult<()>;

    /// Clears the lock regardless of owner (administrative escape hatch)
    fn force_release_lock(&mut self) -> StorageResult<()>;

    /// Returns the current lock row, expired or not
    fn get_lock(&self) -> StorageResult<Option<LockRecord>>;
}
