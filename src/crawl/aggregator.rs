//! Crawl aggregation
//!
//! This module maintains the running aggregate statistics of one crawl run:
//! how many URLs were processed, how many errors the validator reported, the
//! distinct unaccepted error codes seen, and per-content-type validity
//! counts. The aggregate is the single piece of shared mutable state in a
//! crawl and is guarded so snapshots never observe partial updates.

use crate::validation::{ValidationError, ValidationOutcome, ValidationResult};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Validity counts for one content type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeValidity {
    pub valid_count: u64,
    pub invalid_count: u64,
}

/// The aggregate state of one crawl run
///
/// Invariant: `urls_processed` always equals the sum of `valid_count +
/// invalid_count` over all content types; every processed URL lands in
/// exactly one bucket.
#[derive(Debug, Clone)]
pub struct CrawlRun {
    /// When the run started (RFC 3339)
    pub started_at: String,

    /// Number of URLs processed so far
    pub urls_processed: u64,

    /// Every error occurrence the validator reported, accepted or not,
    /// duplicates included
    pub total_errors: u64,

    /// Distinct unaccepted errors in first-seen order, deduplicated by code
    pub unaccepted_errors: Vec<ValidationError>,

    /// Validity counts bucketed by content type
    pub validity_by_type: HashMap<String, TypeValidity>,
}

impl CrawlRun {
    /// Creates an empty aggregate starting now
    pub fn new() -> Self {
        Self {
            started_at: Utc::now().to_rfc3339(),
            urls_processed: 0,
            total_errors: 0,
            unaccepted_errors: Vec::new(),
            validity_by_type: HashMap::new(),
        }
    }

    /// Sum of valid and invalid counts over all content types
    pub fn bucketed_total(&self) -> u64 {
        self.validity_by_type
            .values()
            .map(|v| v.valid_count + v.invalid_count)
            .sum()
    }
}

impl Default for CrawlRun {
    fn default() -> Self {
        Self::new()
    }
}

struct AggregateState {
    run: CrawlRun,
    /// Codes already present in `run.unaccepted_errors`
    seen_codes: HashSet<String>,
}

/// Consumes classified validation results and updates the running aggregate
pub struct CrawlAggregator {
    state: Mutex<AggregateState>,
}

impl CrawlAggregator {
    /// Creates an aggregator for a new run
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AggregateState {
                run: CrawlRun::new(),
                seen_codes: HashSet::new(),
            }),
        }
    }

    /// Records one classified result against its content type
    ///
    /// Transport failures count the URL as invalid for its type and record
    /// no errors. Otherwise every reported error occurrence increments
    /// `total_errors`, each distinct unaccepted code joins the unaccepted
    /// set, and the URL lands in the valid bucket iff no unaccepted error
    /// remains.
    pub fn record(&self, content_type: &str, result: &ValidationResult) {
        let mut state = self.state.lock().unwrap();
        state.run.urls_processed += 1;

        let valid = match &result.outcome {
            ValidationOutcome::TransportFailure { cause } => {
                tracing::debug!("Transport failure for {}: {}", result.url, cause);
                false
            }
            ValidationOutcome::Checked { errors } => {
                state.run.total_errors += errors.len() as u64;

                for error in errors {
                    if !error.accepted && state.seen_codes.insert(error.code.clone()) {
                        state.run.unaccepted_errors.push(error.clone());
                    }
                }

                errors.iter().all(|e| e.accepted)
            }
        };

        let bucket = state
            .run
            .validity_by_type
            .entry(content_type.to_string())
            .or_default();
        if valid {
            bucket.valid_count += 1;
        } else {
            bucket.invalid_count += 1;
        }
    }

    /// Returns a consistent copy of the current aggregate state
    pub fn snapshot(&self) -> CrawlRun {
        self.state.lock().unwrap().run.clone()
    }
}

impl Default for CrawlAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unaccepted(code: &str) -> ValidationError {
        ValidationError::new(code, "message")
    }

    fn accepted(code: &str) -> ValidationError {
        let mut error = ValidationError::new(code, "message");
        error.accepted = true;
        error
    }

    #[test]
    fn test_clean_url_counts_valid() {
        let aggregator = CrawlAggregator::new();
        aggregator.record("post", &ValidationResult::checked("https://e.com/1", vec![]));

        let run = aggregator.snapshot();
        assert_eq!(run.urls_processed, 1);
        assert_eq!(run.total_errors, 0);
        assert!(run.unaccepted_errors.is_empty());
        assert_eq!(run.validity_by_type["post"].valid_count, 1);
        assert_eq!(run.validity_by_type["post"].invalid_count, 0);
    }

    #[test]
    fn test_accepted_errors_still_valid() {
        let aggregator = CrawlAggregator::new();
        aggregator.record(
            "post",
            &ValidationResult::checked("https://e.com/1", vec![accepted("tolerated-code")]),
        );

        let run = aggregator.snapshot();
        assert_eq!(run.total_errors, 1);
        assert!(run.unaccepted_errors.is_empty());
        assert_eq!(run.validity_by_type["post"].valid_count, 1);
    }

    #[test]
    fn test_unaccepted_error_invalidates() {
        let aggregator = CrawlAggregator::new();
        aggregator.record(
            "post",
            &ValidationResult::checked(
                "https://e.com/1",
                vec![accepted("ok-code"), unaccepted("bad-code")],
            ),
        );

        let run = aggregator.snapshot();
        assert_eq!(run.total_errors, 2);
        assert_eq!(run.unaccepted_errors.len(), 1);
        assert_eq!(run.unaccepted_errors[0].code, "bad-code");
        assert_eq!(run.validity_by_type["post"].invalid_count, 1);
        assert_eq!(run.validity_by_type["post"].valid_count, 0);
    }

    #[test]
    fn test_duplicate_codes_counted_once_in_set() {
        let aggregator = CrawlAggregator::new();
        for i in 0..3 {
            aggregator.record(
                "post",
                &ValidationResult::checked(
                    format!("https://e.com/{}", i),
                    vec![unaccepted("repeat-code")],
                ),
            );
        }

        let run = aggregator.snapshot();
        // total_errors counts every occurrence; the set does not
        assert_eq!(run.total_errors, 3);
        assert_eq!(run.unaccepted_errors.len(), 1);
        assert_eq!(run.validity_by_type["post"].invalid_count, 3);
    }

    #[test]
    fn test_transport_failure_counts_invalid_without_errors() {
        let aggregator = CrawlAggregator::new();
        aggregator.record(
            "page",
            &ValidationResult::transport_failure("https://e.com/down", "HTTP 502"),
        );

        let run = aggregator.snapshot();
        assert_eq!(run.urls_processed, 1);
        assert_eq!(run.total_errors, 0);
        assert!(run.unaccepted_errors.is_empty());
        assert_eq!(run.validity_by_type["page"].invalid_count, 1);
    }

    #[test]
    fn test_processed_equals_bucketed_total() {
        let aggregator = CrawlAggregator::new();
        aggregator.record("post", &ValidationResult::checked("https://e.com/1", vec![]));
        aggregator.record(
            "page",
            &ValidationResult::checked("https://e.com/2", vec![unaccepted("x")]),
        );
        aggregator.record(
            "post",
            &ValidationResult::transport_failure("https://e.com/3", "timeout"),
        );

        let run = aggregator.snapshot();
        assert_eq!(run.urls_processed, 3);
        assert_eq!(run.urls_processed, run.bucketed_total());
    }

    #[test]
    fn test_thirty_one_unique_unaccepted_errors() {
        // 31 URLs of one type, each with one unaccepted error of a unique code
        let aggregator = CrawlAggregator::new();
        for i in 0..31 {
            aggregator.record(
                "post",
                &ValidationResult::checked(
                    format!("https://e.com/{}", i),
                    vec![unaccepted(&format!("code-{}", i))],
                ),
            );
        }

        let run = aggregator.snapshot();
        assert_eq!(run.urls_processed, 31);
        assert_eq!(run.total_errors, 31);
        assert_eq!(run.unaccepted_errors.len(), 31);
        assert_eq!(run.validity_by_type.len(), 1);
        assert_eq!(run.validity_by_type["post"].invalid_count, 31);
    }

    #[test]
    fn test_first_seen_order_preserved() {
        let aggregator = CrawlAggregator::new();
        for code in ["zebra", "alpha", "mango"] {
            aggregator.record(
                "post",
                &ValidationResult::checked("https://e.com/x", vec![unaccepted(code)]),
            );
        }

        let run = aggregator.snapshot();
        let codes: Vec<&str> = run.unaccepted_errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["zebra", "alpha", "mango"]);
    }
}
