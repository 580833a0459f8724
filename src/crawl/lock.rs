//! Crawl lock
//!
//! Crawls are triggered from several independent sources (scheduler, admin
//! action, programmatic caller) that may race; this lock is the sole
//! serialization point. It is a single database row taken with one atomic
//! compare-and-set statement and bounded by a lease: a holder that dies
//! without releasing is healed when the lease expires.

use crate::storage::{SqliteStorage, Storage};
use crate::SitelintError;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generates a process-unique owner token
fn next_token() -> String {
    let counter = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}-{}-{}",
        std::process::id(),
        Utc::now().timestamp_micros(),
        counter
    )
}

/// RAII guard for a held crawl lock
///
/// Dropping the guard releases the lock, so every exit path of a crawl
/// (normal completion, error return, panic) gives the lock back. Release is
/// token-checked: if the lease already expired and a newer run took the
/// lock, this guard's release is a no-op.
pub struct LockGuard {
    storage: Arc<Mutex<SqliteStorage>>,
    token: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let mut storage = self.storage.lock().unwrap();
        if let Err(e) = storage.release_lock(&self.token) {
            tracing::error!("Failed to release crawl lock: {}", e);
        }
    }
}

/// Timeout-bound mutual exclusion for crawl runs
pub struct CrawlLock {
    storage: Arc<Mutex<SqliteStorage>>,
    timeout_secs: u64,
}

impl CrawlLock {
    /// Creates a lock handle over shared storage
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage holding the lock row
    /// * `timeout_secs` - Lease duration; an unreleased lock older than this
    ///   is treated as abandoned
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, timeout_secs: u64) -> Self {
        Self {
            storage,
            timeout_secs,
        }
    }

    /// Attempts to take the lock
    ///
    /// # Returns
    ///
    /// * `Ok(LockGuard)` - The lock was taken; dropping the guard releases it
    /// * `Err(SitelintError::AlreadyLocked)` - An unexpired lock is held
    pub fn acquire(&self) -> Result<LockGuard, SitelintError> {
        let token = next_token();
        let now = Utc::now().timestamp();

        let acquired = {
            let mut storage = self.storage.lock().unwrap();
            storage.try_acquire_lock(&token, now, self.timeout_secs)?
        };

        if acquired {
            tracing::debug!("Crawl lock acquired (token {})", token);
            Ok(LockGuard {
                storage: Arc::clone(&self.storage),
                token,
            })
        } else {
            Err(SitelintError::AlreadyLocked)
        }
    }

    /// Returns true iff an unexpired lock currently exists
    pub fn is_locked(&self) -> Result<bool, SitelintError> {
        let now = Utc::now().timestamp();
        let storage = self.storage.lock().unwrap();
        let lock = storage.get_lock()?;
        Ok(lock.map(|l| l.is_active(now)).unwrap_or(false))
    }

    /// Clears the lock regardless of owner
    ///
    /// Administrative escape hatch for manual recovery from a stuck lock
    /// before its natural timeout. Never called by the crawl itself.
    pub fn force_unlock(&self) -> Result<(), SitelintError> {
        let mut storage = self.storage.lock().unwrap();
        storage.force_release_lock()?;
        tracing::warn!("Crawl lock force-released");
        Ok(())
    }

    /// Runs a closure while holding the lock
    ///
    /// Acquires, executes `f`, and releases on every exit path of `f`
    /// including panics (via the guard's `Drop`). If the lock is already
    /// held, returns `AlreadyLocked` without running `f`.
    pub fn with_lock<T, F: FnOnce() -> T>(&self, f: F) -> Result<T, SitelintError> {
        let guard = self.acquire()?;
        let result = f();
        drop(guard);
        Ok(result)
    }
}
