//! Configuration module for sitelint
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sitelint::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitelint.toml")).unwrap();
//! println!("URL cap per crawl: {}", config.crawl.url_cap);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AcceptanceEntry, Config, CrawlConfig, OutputConfig, ValidatorConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
