//! Crawl orchestrator
//!
//! Ties the crawl together: takes the lock, drains the URL source through
//! the validation client, feeds the classifier and the aggregator, and
//! releases the lock on every exit path. A failure for one URL never aborts
//! the whole crawl; only lock contention and source failures surface to the
//! caller.
//!
//! One run moves Idle -> Locked -> Running -> (Completed | Aborted) -> Idle.
//! Aborted runs persist their partial snapshot so a later invocation resumes
//! from the inventory bookkeeping instead of starting from zero.

use crate::config::Config;
use crate::crawl::aggregator::{CrawlAggregator, CrawlRun};
use crate::crawl::lock::CrawlLock;
use crate::source::{InventorySource, UrlSource};
use crate::storage::{RunStatus, SqliteStorage, Storage};
use crate::validation::{ErrorClassifier, ValidationClient};
use crate::SitelintError;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How many URLs to request from the source at a time
const SOURCE_BATCH: usize = 50;

/// Snapshot persistence cadence, in processed URLs
const CHECKPOINT_INTERVAL: usize = 25;

/// Drives one bounded validation pass over the content inventory
pub struct Orchestrator<C: ValidationClient> {
    storage: Arc<Mutex<SqliteStorage>>,
    client: C,
    classifier: ErrorClassifier,
    lock: CrawlLock,
    config: Arc<Config>,
    config_hash: String,
}

impl<C: ValidationClient> Orchestrator<C> {
    /// Creates an orchestrator over shared storage
    pub fn new(
        storage: Arc<Mutex<SqliteStorage>>,
        client: C,
        config: Config,
        config_hash: impl Into<String>,
    ) -> Self {
        let classifier = ErrorClassifier::from_config(&config.acceptance);
        let lock = CrawlLock::new(Arc::clone(&storage), config.crawl.lock_timeout_secs);
        Self {
            storage,
            client,
            classifier,
            lock,
            config: Arc::new(config),
            config_hash: config_hash.into(),
        }
    }

    /// The crawl lock, for inspection surfaces
    pub fn lock(&self) -> &CrawlLock {
        &self.lock
    }

    /// Runs one validation crawl over at most `max_urls` URLs
    ///
    /// All three trigger surfaces (scheduler, admin action, programmatic
    /// caller) invoke this same contract. Concurrent invocations beyond the
    /// first observe `AlreadyLocked` and should retry later on their own
    /// schedule.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlRun)` - The final aggregate of a completed run
    /// * `Err(SitelintError::AlreadyLocked)` - A crawl is already in progress
    /// * `Err(_)` - The run aborted; its partial snapshot was persisted
    pub async fn run_crawl(&self, max_urls: usize) -> Result<CrawlRun, SitelintError> {
        let mut source = InventorySource::new(
            Arc::clone(&self.storage),
            self.config.crawl.stale_after_secs,
        );
        self.run_with_source(&mut source, max_urls).await
    }

    async fn run_with_source<S: UrlSource>(
        &self,
        source: &mut S,
        max_urls: usize,
    ) -> Result<CrawlRun, SitelintError> {
        // Idle -> Locked; AlreadyLocked surfaces before any state is touched
        let guard = self.lock.acquire()?;

        let run_id = {
            let mut storage = self.storage.lock().unwrap();
            storage.create_run(&self.config_hash)?
        };
        tracing::info!("Starting validation crawl run {} (cap {})", run_id, max_urls);

        let aggregator = CrawlAggregator::new();
        let delay = Duration::from_millis(self.config.crawl.request_delay_ms);
        let start_time = std::time::Instant::now();
        let mut processed = 0usize;

        // Locked -> Running
        'drain: while processed < max_urls {
            let want = (max_urls - processed).min(SOURCE_BATCH);
            let batch = match source.next_batch(want) {
                Ok(batch) => batch,
                Err(e) => {
                    // Running -> Aborted: the inventory itself is broken
                    tracing::error!("URL source failed, aborting run {}: {}", run_id, e);
                    self.finalize(run_id, &aggregator, RunStatus::Aborted);
                    return Err(e.into());
                }
            };

            if batch.is_empty() {
                tracing::info!("URL source exhausted after {} URLs", processed);
                break 'drain;
            }

            for entry in batch {
                if processed > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                // Per-URL step; transport failures are recorded, never fatal
                let mut result = self.client.validate(&entry.url).await;
                self.classifier.classify(&mut result);
                let valid = self.classifier.is_valid(&result);
                aggregator.record(&entry.content_type, &result);

                if let Err(e) = self.mark_validated(&entry.url, valid) {
                    tracing::error!("Inventory update failed, aborting run {}: {}", run_id, e);
                    self.finalize(run_id, &aggregator, RunStatus::Aborted);
                    return Err(e);
                }

                processed += 1;

                if processed % 10 == 0 {
                    let rate = processed as f64 / start_time.elapsed().as_secs_f64();
                    tracing::info!(
                        "Progress: {} URLs validated, {:.2} URLs/sec",
                        processed,
                        rate
                    );
                }

                if processed % CHECKPOINT_INTERVAL == 0 {
                    if let Err(e) = self.persist_snapshot(run_id, &aggregator) {
                        tracing::error!("Checkpoint failed, aborting run {}: {}", run_id, e);
                        self.finalize(run_id, &aggregator, RunStatus::Aborted);
                        return Err(e);
                    }
                }
            }
        }

        // Running -> Completed. A failure here still leaves the aborted
        // marker; the run row must never stay `running` after the lock is
        // released.
        if let Err(e) = self.persist_snapshot(run_id, &aggregator) {
            tracing::error!("Final snapshot failed, aborting run {}: {}", run_id, e);
            self.finalize(run_id, &aggregator, RunStatus::Aborted);
            return Err(e);
        }
        let finished = {
            let mut storage = self.storage.lock().unwrap();
            storage.finish_run(run_id, RunStatus::Completed)
        };
        if let Err(e) = finished {
            tracing::error!("Failed to mark run {} completed: {}", run_id, e);
            self.finalize(run_id, &aggregator, RunStatus::Aborted);
            return Err(e.into());
        }

        let snapshot = aggregator.snapshot();
        tracing::info!(
            "Crawl run {} completed: {} URLs, {} errors, {} unaccepted codes in {:?}",
            run_id,
            snapshot.urls_processed,
            snapshot.total_errors,
            snapshot.unaccepted_errors.len(),
            start_time.elapsed()
        );

        // Completed -> Idle
        drop(guard);
        Ok(snapshot)
    }

    /// Records the verdict for a processed URL in the inventory
    fn mark_validated(&self, url: &str, valid: bool) -> Result<(), SitelintError> {
        let now = Utc::now().timestamp();
        let mut storage = self.storage.lock().unwrap();
        storage.mark_validated(url, valid, now)?;
        Ok(())
    }

    /// Persists the current aggregate snapshot for a run
    fn persist_snapshot(
        &self,
        run_id: i64,
        aggregator: &CrawlAggregator,
    ) -> Result<(), SitelintError> {
        let snapshot = aggregator.snapshot();
        let mut storage = self.storage.lock().unwrap();
        storage.save_snapshot(run_id, &snapshot)?;
        Ok(())
    }

    /// Best-effort finalization on the abort path; the original error is the
    /// one the caller sees, so failures here are only logged
    fn finalize(&self, run_id: i64, aggregator: &CrawlAggregator, status: RunStatus) {
        if let Err(e) = self.persist_snapshot(run_id, aggregator) {
            tracing::error!("Failed to persist partial snapshot of run {}: {}", run_id, e);
        }
        let mut storage = self.storage.lock().unwrap();
        if let Err(e) = storage.finish_run(run_id, status) {
            tracing::error!("Failed to finalize run {}: {}", run_id, e);
        }
    }
}
