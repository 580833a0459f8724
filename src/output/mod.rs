//! Output module for reporting crawl results
//!
//! This module reads persisted run data back out of storage and renders it
//! for operators.

mod report;

pub use report::{load_report, print_report, RunReport};
