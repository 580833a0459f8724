use crate::config::types::{
    AcceptanceEntry, Config, CrawlConfig, OutputConfig, ValidatorConfig,
};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_validator_config(&config.validator)?;
    validate_output_config(&config.output)?;
    validate_acceptance_entries(&config.acceptance)?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.url_cap < 1 {
        return Err(ConfigError::Validation(format!(
            "url_cap must be >= 1, got {}",
            config.url_cap
        )));
    }

    if config.lock_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "lock_timeout_secs must be >= 1, got {}",
            config.lock_timeout_secs
        )));
    }

    if config.stale_after_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "stale_after_secs must be >= 1, got {}",
            config.stale_after_secs
        )));
    }

    Ok(())
}

/// Validates validator endpoint configuration
fn validate_validator_config(config: &ValidatorConfig) -> Result<(), ConfigError> {
    if config.query_param.is_empty() {
        return Err(ConfigError::Validation(
            "query_param cannot be empty".to_string(),
        ));
    }

    // Query parameter names must survive URL encoding untouched
    if !config
        .query_param
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "query_param must contain only alphanumeric characters, '_' or '-', got '{}'",
            config.query_param
        )));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates acceptance rule entries
fn validate_acceptance_entries(entries: &[AcceptanceEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        if entry.code.is_empty() {
            return Err(ConfigError::Validation(
                "acceptance rule code cannot be empty".to_string(),
            ));
        }

        if let Some(node_name) = &entry.node_name {
            if node_name.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "acceptance rule for '{}' has an empty node-name; omit the key instead",
                    entry.code
                )));
            }
        }
    }

    Ok(())
}
