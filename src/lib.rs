//! Sitelint: a site-wide markup validation crawler
//!
//! This crate walks a content inventory of (url, content-type) pairs, asks an
//! external markup validator about each URL, classifies the reported errors
//! against operator acceptance rules, and keeps per-run aggregate health
//! statistics. Only one crawl may run at a time; an expiring database lock
//! serializes concurrent triggers.

pub mod config;
pub mod crawl;
pub mod output;
pub mod source;
pub mod storage;
pub mod validation;

use thiserror::Error;

/// Main error type for sitelint operations
#[derive(Debug, Error)]
pub enum SitelintError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Another crawl holds the lock. Expected under concurrent triggers;
    /// callers should report it and retry on their own schedule.
    #[error("A validation crawl is already in progress")]
    AlreadyLocked,

    #[error("URL source failed: {0}")]
    Source(#[from] source::SourceError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid inventory line {line}: {message}")]
    Import { line: usize, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for sitelint operations
pub type Result<T> = std::result::Result<T, SitelintError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawl::{CrawlAggregator, CrawlLock, CrawlRun, Orchestrator};
pub use validation::{ValidationError, ValidationOutcome, ValidationResult};
