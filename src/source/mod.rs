//! URL source
//!
//! Supplies the lazy sequence of (url, content-type) pairs a crawl should
//! validate. Entries come from the content inventory; URLs whose last
//! verdict was valid and still fresh are excluded, and a URL is never
//! yielded twice within one run even when its verdict stays invalid.

use crate::storage::{InventoryEntry, SqliteStorage, Storage, StorageError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from the URL source
///
/// Source failures are fatal to the current run: the crawl aborts with a
/// partial snapshot rather than looping over a broken inventory.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Inventory unavailable: {0}")]
    Storage(#[from] StorageError),
}

/// Contract for the candidate-URL sequence of a crawl
pub trait UrlSource {
    /// Produces the next batch of at most `max` due entries.
    /// An empty batch means the source is exhausted for this run.
    fn next_batch(&mut self, max: usize) -> Result<Vec<InventoryEntry>, SourceError>;
}

/// URL source backed by the SQLite content inventory
pub struct InventorySource {
    storage: Arc<Mutex<SqliteStorage>>,
    stale_after_secs: u64,
    /// URLs already handed out during this run
    yielded: HashSet<String>,
}

impl InventorySource {
    /// Creates a source for one crawl run
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage holding the inventory
    /// * `stale_after_secs` - Freshness window for known-valid URLs
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, stale_after_secs: u64) -> Self {
        Self {
            storage,
            stale_after_secs,
            yielded: HashSet::new(),
        }
    }

    /// Number of URLs handed out so far in this run
    pub fn yielded_count(&self) -> usize {
        self.yielded.len()
    }
}

impl UrlSource for InventorySource {
    fn next_batch(&mut self, max: usize) -> Result<Vec<InventoryEntry>, SourceError> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let now = Utc::now().timestamp();

        // Over-fetch by the yielded count so entries we already handed out
        // (and that are still due, e.g. invalid verdicts) cannot starve the
        // batch.
        let limit = max + self.yielded.len();
        let due = {
            let storage = self.storage.lock().unwrap();
            storage.list_due_urls(now, self.stale_after_secs, limit)?
        };

        let mut batch = Vec::with_capacity(max);
        for entry in due {
            if batch.len() >= max {
                break;
            }
            if self.yielded.insert(entry.url.clone()) {
                batch.push(entry);
            }
        }

        tracing::trace!("Source produced batch of {} URLs", batch.len());
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_storage(urls: &[(&str, &str)]) -> Arc<Mutex<SqliteStorage>> {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        for (url, content_type) in urls {
            storage.upsert_url(url, content_type).unwrap();
        }
        Arc::new(Mutex::new(storage))
    }

    #[test]
    fn test_batches_drain_inventory() {
        let storage = seeded_storage(&[
            ("https://e.com/1", "post"),
            ("https://e.com/2", "post"),
            ("https://e.com/3", "page"),
        ]);
        let mut source = InventorySource::new(storage, 3600);

        let first = source.next_batch(2).unwrap();
        assert_eq!(first.len(), 2);

        let second = source.next_batch(2).unwrap();
        assert_eq!(second.len(), 1);

        let third = source.next_batch(2).unwrap();
        assert!(third.is_empty());
        assert_eq!(source.yielded_count(), 3);
    }

    #[test]
    fn test_no_url_yielded_twice_within_run() {
        let storage = seeded_storage(&[("https://e.com/1", "post")]);
        let mut source = InventorySource::new(Arc::clone(&storage), 3600);

        let first = source.next_batch(10).unwrap();
        assert_eq!(first.len(), 1);

        // The URL was validated invalid, so it stays due in the inventory,
        // but this run must not see it again
        storage
            .lock()
            .unwrap()
            .mark_validated("https://e.com/1", false, Utc::now().timestamp())
            .unwrap();

        let second = source.next_batch(10).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_fresh_valid_excluded() {
        let storage = seeded_storage(&[
            ("https://e.com/fresh", "post"),
            ("https://e.com/due", "post"),
        ]);
        storage
            .lock()
            .unwrap()
            .mark_validated("https://e.com/fresh", true, Utc::now().timestamp())
            .unwrap();

        let mut source = InventorySource::new(storage, 3600);
        let batch = source.next_batch(10).unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].url, "https://e.com/due");
    }

    #[test]
    fn test_zero_max_yields_nothing() {
        let storage = seeded_storage(&[("https://e.com/1", "post")]);
        let mut source = InventorySource::new(storage, 3600);
        assert!(source.next_batch(0).unwrap().is_empty());
    }
}
