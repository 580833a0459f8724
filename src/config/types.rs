use serde::Deserialize;

/// Main configuration structure for sitelint
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub validator: ValidatorConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub acceptance: Vec<AcceptanceEntry>,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    /// Maximum number of URLs validated in a single crawl invocation
    #[serde(rename = "url-cap")]
    pub url_cap: usize,

    /// Seconds before an unreleased crawl lock is treated as abandoned
    #[serde(rename = "lock-timeout-secs")]
    pub lock_timeout_secs: u64,

    /// Seconds a known-valid URL stays excluded from re-validation
    #[serde(rename = "stale-after-secs")]
    pub stale_after_secs: u64,

    /// Minimum delay between validation requests (milliseconds)
    #[serde(rename = "request-delay-ms", default)]
    pub request_delay_ms: u64,
}

/// Validator endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Query parameter appended to each URL to request a validation response
    #[serde(rename = "query-param")]
    pub query_param: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// An operator-approved tolerance rule for a validation error
#[derive(Debug, Clone, Deserialize)]
pub struct AcceptanceEntry {
    /// Error code the rule tolerates (e.g., "disallowed-attribute")
    pub code: String,

    /// Optional node name the rule is scoped to; absent means any context
    #[serde(rename = "node-name")]
    pub node_name: Option<String>,
}
