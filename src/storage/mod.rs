//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the validation crawler,
//! including:
//! - SQLite database initialization and schema management
//! - Run tracking and aggregate snapshot persistence
//! - Content inventory bookkeeping (staleness, last verdicts)
//! - The crawl lock row and its compare-and-set acquisition

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

/// Represents a crawl run row
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Represents one inventory entry due for validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    pub url: String,
    pub content_type: String,
}

/// Represents the crawl lock row, if present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    /// Opaque owner token; only the matching holder may release the lock
    pub token: String,

    /// Unix seconds when the lock was taken
    pub acquired_at: i64,

    /// Unix seconds after which the lock is treated as abandoned
    pub expires_at: i64,
}

impl LockRecord {
    /// Returns true if the lock is still honored at the given time
    pub fn is_active(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// The run ended before draining its URL budget; the persisted snapshot
    /// is partial and a later run resumes from the inventory bookkeeping.
    Aborted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}
