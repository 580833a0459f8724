//! HTTP validation client
//!
//! This module performs a single URL validation over the network. The
//! validator is addressed by re-requesting the page with a marker query
//! parameter appended; the response is a JSON document listing the markup
//! errors found. Transport failures are classified and reported as data, not
//! propagated as errors: the crawl must continue past an unreachable URL.
//!
//! The client never retries. Retry policy, if any, belongs to the
//! orchestrator that drives the crawl.

use crate::validation::{
    ValidationError, ValidationResult, UNCLASSIFIABLE_CODE,
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Contract for the single-URL validation capability.
///
/// The engine depends only on this contract; tests substitute scripted
/// implementations for the HTTP-backed one.
pub trait ValidationClient {
    /// Validates one URL and always produces a result, absorbing transport
    /// failures into the `TransportFailure` outcome.
    fn validate(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = ValidationResult> + Send;
}

/// Wire format of the validator response body
#[derive(Debug, Deserialize)]
struct ValidatorResponse {
    #[serde(default)]
    results: Vec<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    node_name: Option<String>,
}

/// Builds an HTTP client configured for validator requests
///
/// # Arguments
///
/// * `timeout_secs` - Per-request timeout in seconds
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_validator_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("sitelint/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP-backed validation client
pub struct HttpValidationClient {
    client: Client,
    query_param: String,
}

impl HttpValidationClient {
    /// Creates a new client
    ///
    /// # Arguments
    ///
    /// * `client` - The underlying HTTP client (see [`build_validator_client`])
    /// * `query_param` - Query parameter that switches the page into
    ///   validation mode (e.g., "validate")
    pub fn new(client: Client, query_param: impl Into<String>) -> Self {
        Self {
            client,
            query_param: query_param.into(),
        }
    }

    /// Appends the validation marker parameter to a URL
    fn validation_url(&self, url: &str) -> Result<Url, url::ParseError> {
        let mut target = Url::parse(url)?;
        target
            .query_pairs_mut()
            .append_pair(&self.query_param, "1");
        Ok(target)
    }
}

impl ValidationClient for HttpValidationClient {
    async fn validate(&self, url: &str) -> ValidationResult {
        let target = match self.validation_url(url) {
            Ok(t) => t,
            Err(e) => {
                return ValidationResult::transport_failure(url, format!("Invalid URL: {}", e));
            }
        };

        let response = match self.client.get(target).send().await {
            Ok(r) => r,
            Err(e) => {
                // Classify transport error
                let cause = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    "Connection refused".to_string()
                } else {
                    e.to_string()
                };
                return ValidationResult::transport_failure(url, cause);
            }
        };

        let status = response.status();
        if !status.is_success() {
            return ValidationResult::transport_failure(url, format!("HTTP {}", status.as_u16()));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return ValidationResult::transport_failure(url, e.to_string());
            }
        };

        match serde_json::from_str::<ValidatorResponse>(&body) {
            Ok(parsed) => {
                let errors = parsed
                    .results
                    .into_iter()
                    .map(|raw| ValidationError {
                        code: raw.code,
                        message: raw.message,
                        node_name: raw.node_name,
                        accepted: false,
                    })
                    .collect();
                ValidationResult::checked(url, errors)
            }
            Err(e) => {
                // The URL answered but the payload is not a validator
                // response. Surface it in aggregates as an unclassifiable
                // error rather than failing the crawl.
                tracing::warn!("Malformed validator response for {}: {}", url, e);
                let error = ValidationError::new(
                    UNCLASSIFIABLE_CODE,
                    format!("Malformed validator response: {}", e),
                );
                ValidationResult::checked(url, vec![error])
            }
        }
    }
}
