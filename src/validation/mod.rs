//! Validation domain types and capabilities
//!
//! This module contains the structured representation of a single URL
//! validation, the HTTP client that talks to the validator endpoint, and the
//! classifier that decides which reported errors an operator tolerates.

mod classifier;
mod client;

pub use classifier::{AcceptanceRules, ErrorClassifier};
pub use client::{build_validator_client, HttpValidationClient, ValidationClient};

/// Synthetic error code assigned to results that cannot be classified
/// (missing code, malformed validator payload). Always unaccepted so the
/// condition stays visible in aggregates instead of being dropped.
pub const UNCLASSIFIABLE_CODE: &str = "internal:unclassifiable";

/// A single structural markup error reported by the validator for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Identifier of the violated rule (e.g., "disallowed-attribute")
    pub code: String,

    /// Human-readable description of the violation
    pub message: String,

    /// Structural location of the violation, when the validator reports one
    pub node_name: Option<String>,

    /// Whether an operator acceptance rule tolerates this error.
    /// Set by the classifier, never by the validation client.
    pub accepted: bool,
}

impl ValidationError {
    /// Creates an unclassified error; `accepted` starts false until the
    /// classifier has seen it.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            node_name: None,
            accepted: false,
        }
    }

    /// Attaches a node context to the error
    pub fn with_node_name(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }
}

/// What happened when one URL was validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The validator responded; the URL may still be invalid if any of the
    /// errors end up unaccepted. An empty list means a clean document.
    Checked { errors: Vec<ValidationError> },

    /// The URL could not be fetched or validated at all. Not a markup error,
    /// but never silently dropped: the URL counts as invalid for its type.
    TransportFailure { cause: String },
}

/// The validation result for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub url: String,
    pub outcome: ValidationOutcome,
}

impl ValidationResult {
    /// Creates a result for a URL the validator answered for
    pub fn checked(url: impl Into<String>, errors: Vec<ValidationError>) -> Self {
        Self {
            url: url.into(),
            outcome: ValidationOutcome::Checked { errors },
        }
    }

    /// Creates a result for a URL that could not be reached
    pub fn transport_failure(url: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: ValidationOutcome::TransportFailure {
                cause: cause.into(),
            },
        }
    }

    /// Returns true if the result carries a transport failure
    pub fn is_transport_failure(&self) -> bool {
        matches!(self.outcome, ValidationOutcome::TransportFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_builder() {
        let err = ValidationError::new("disallowed-attribute", "attribute onclick not allowed")
            .with_node_name("onclick");

        assert_eq!(err.code, "disallowed-attribute");
        assert_eq!(err.node_name.as_deref(), Some("onclick"));
        assert!(!err.accepted);
    }

    #[test]
    fn test_outcome_variants() {
        let ok = ValidationResult::checked("https://example.com/a", vec![]);
        assert!(!ok.is_transport_failure());

        let failed = ValidationResult::transport_failure("https://example.com/b", "HTTP 502");
        assert!(failed.is_transport_failure());
    }
}
