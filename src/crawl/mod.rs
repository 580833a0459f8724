//! Crawl engine
//!
//! The run lock, the aggregate statistics of a run, and the orchestrator
//! that drives one bounded validation pass.

mod aggregator;
mod lock;
mod orchestrator;

pub use aggregator::{CrawlAggregator, CrawlRun, TypeValidity};
pub use lock::{CrawlLock, LockGuard};
pub use orchestrator::Orchestrator;
