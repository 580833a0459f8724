//! Run report generation from the crawl database
//!
//! This module provides functionality for extracting and displaying the
//! outcome of the most recent validation crawl from the storage layer.

use crate::crawl::CrawlRun;
use crate::storage::{LockRecord, RunRecord, Storage};
use crate::SitelintError;
use chrono::Utc;

/// Report over the most recent crawl run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The run row itself
    pub run: RunRecord,

    /// The persisted aggregate snapshot of that run
    pub snapshot: CrawlRun,

    /// Total number of URLs known to the inventory
    pub inventory_total: u64,

    /// The crawl lock row, if one exists (expired or not)
    pub lock: Option<LockRecord>,
}

/// Loads the report for the latest run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(Some(RunReport))` - The latest run and its snapshot
/// * `Ok(None)` - No crawl has run yet
/// * `Err(SitelintError)` - Failed to query the database
pub fn load_report(storage: &dyn Storage) -> Result<Option<RunReport>, SitelintError> {
    let run = match storage.get_latest_run()? {
        Some(run) => run,
        None => return Ok(None),
    };

    let snapshot = storage.load_snapshot(run.id)?;
    let inventory_total = storage.count_inventory()?;
    let lock = storage.get_lock()?;

    Ok(Some(RunReport {
        run,
        snapshot,
        inventory_total,
        lock,
    }))
}

/// Prints a run report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &RunReport) {
    println!("=== Validation Crawl Report ===\n");

    println!("Run #{}:", report.run.id);
    println!("  Status: {}", report.run.status.to_db_string());
    println!("  Started: {}", report.run.started_at);
    if let Some(finished_at) = &report.run.finished_at {
        println!("  Finished: {}", finished_at);
    }
    println!("  Config hash: {}", report.run.config_hash);
    println!();

    println!("Overview:");
    println!("  URLs in inventory: {}", report.inventory_total);
    println!("  URLs processed: {}", report.snapshot.urls_processed);
    println!("  Total errors reported: {}", report.snapshot.total_errors);
    println!(
        "  Distinct unaccepted codes: {}",
        report.snapshot.unaccepted_errors.len()
    );
    println!();

    if !report.snapshot.validity_by_type.is_empty() {
        println!("Validity by Content Type:");
        // Sort types by invalid count (descending)
        let mut type_counts: Vec<_> = report.snapshot.validity_by_type.iter().collect();
        type_counts.sort_by(|a, b| b.1.invalid_count.cmp(&a.1.invalid_count));

        for (content_type, validity) in type_counts {
            let total = validity.valid_count + validity.invalid_count;
            let percentage = if total > 0 {
                (validity.valid_count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            println!(
                "  {}: {} valid / {} invalid ({:.1}% valid)",
                content_type, validity.valid_count, validity.invalid_count, percentage
            );
        }
        println!();
    }

    if !report.snapshot.unaccepted_errors.is_empty() {
        println!(
            "Unaccepted Errors ({}):",
            report.snapshot.unaccepted_errors.len()
        );
        for error in &report.snapshot.unaccepted_errors {
            match &error.node_name {
                Some(node) => println!("  - {} ({}): {}", error.code, node, error.message),
                None => println!("  - {}: {}", error.code, error.message),
            }
        }
        println!();
    }

    match &report.lock {
        Some(lock) if lock.is_active(Utc::now().timestamp()) => {
            println!("Lock: held (expires at unix {})", lock.expires_at);
        }
        _ => println!("Lock: free"),
    }

    // Overall site health across all types
    let valid_total: u64 = report
        .snapshot
        .validity_by_type
        .values()
        .map(|v| v.valid_count)
        .sum();
    let health = if report.snapshot.urls_processed > 0 {
        (valid_total as f64 / report.snapshot.urls_processed as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "\nSite Health: {:.1}% ({} / {} URLs valid)",
        health, valid_total, report.snapshot.urls_processed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::TypeValidity;
    use crate::storage::{RunStatus, SqliteStorage};
    use crate::validation::{ValidationError, ValidationResult};
    use crate::CrawlAggregator;

    #[test]
    fn test_load_report_empty_database() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(load_report(&storage).unwrap().is_none());
    }

    #[test]
    fn test_load_report_latest_run() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.upsert_url("https://e.com/a", "post").unwrap();
        storage.upsert_url("https://e.com/b", "page").unwrap();

        let run_id = storage.create_run("hash").unwrap();
        let aggregator = CrawlAggregator::new();
        aggregator.record(
            "post",
            &ValidationResult::checked(
                "https://e.com/a",
                vec![ValidationError::new("bad-code", "m")],
            ),
        );
        aggregator.record("page", &ValidationResult::checked("https://e.com/b", vec![]));
        storage.save_snapshot(run_id, &aggregator.snapshot()).unwrap();
        storage.finish_run(run_id, RunStatus::Completed).unwrap();

        let report = load_report(&storage).unwrap().unwrap();
        assert_eq!(report.run.id, run_id);
        assert_eq!(report.run.status, RunStatus::Completed);
        assert_eq!(report.inventory_total, 2);
        assert_eq!(report.snapshot.urls_processed, 2);
        assert_eq!(
            report.snapshot.validity_by_type["post"],
            TypeValidity {
                valid_count: 0,
                invalid_count: 1
            }
        );
        assert!(report.lock.is_none());
    }
}
