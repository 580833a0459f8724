//! Error classifier
//!
//! Decides, for each validation error, whether an operator acceptance rule
//! tolerates it. A URL is considered valid for aggregation purposes iff it
//! has zero unaccepted errors: an error-free URL and a URL whose errors are
//! all accepted both count as valid.
//!
//! All acceptance knowledge lives here; the crawl loop never consults the
//! acceptance configuration directly.

use crate::config::AcceptanceEntry;
use crate::validation::{ValidationError, ValidationOutcome, ValidationResult, UNCLASSIFIABLE_CODE};

/// The operator-approved tolerance rules, indexed for lookup
#[derive(Debug, Clone, Default)]
pub struct AcceptanceRules {
    rules: Vec<AcceptanceEntry>,
}

impl AcceptanceRules {
    pub fn new(rules: Vec<AcceptanceEntry>) -> Self {
        Self { rules }
    }

    /// Returns true if any rule tolerates the given error.
    ///
    /// A rule without a node name matches every context for its code; a rule
    /// with a node name only matches errors reported at that node.
    pub fn accepts(&self, error: &ValidationError) -> bool {
        self.rules.iter().any(|rule| {
            if rule.code != error.code {
                return false;
            }
            match &rule.node_name {
                Some(node_name) => error.node_name.as_deref() == Some(node_name.as_str()),
                None => true,
            }
        })
    }
}

/// Classifies validation errors against acceptance rules
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    rules: AcceptanceRules,
}

impl ErrorClassifier {
    pub fn new(rules: AcceptanceRules) -> Self {
        Self { rules }
    }

    /// Builds a classifier from the raw configuration entries
    pub fn from_config(entries: &[AcceptanceEntry]) -> Self {
        Self::new(AcceptanceRules::new(entries.to_vec()))
    }

    /// Sets the `accepted` flag on every error of a result, in place.
    ///
    /// Errors that cannot be classified (empty code) are rewritten to the
    /// synthetic [`UNCLASSIFIABLE_CODE`] and left unaccepted so they remain
    /// visible in aggregates. Transport failures carry no errors and pass
    /// through untouched.
    pub fn classify(&self, result: &mut ValidationResult) {
        if let ValidationOutcome::Checked { errors } = &mut result.outcome {
            for error in errors.iter_mut() {
                if error.code.is_empty() {
                    tracing::warn!(
                        "Unclassifiable validation error for {} (missing code)",
                        result.url
                    );
                    error.code = UNCLASSIFIABLE_CODE.to_string();
                    error.accepted = false;
                    continue;
                }
                error.accepted = self.rules.accepts(error);
            }
        }
    }

    /// Returns true if a classified result leaves the URL valid:
    /// the validator answered and no unaccepted error remains.
    pub fn is_valid(&self, result: &ValidationResult) -> bool {
        match &result.outcome {
            ValidationOutcome::Checked { errors } => errors.iter().all(|e| e.accepted),
            ValidationOutcome::TransportFailure { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(entries: Vec<(&str, Option<&str>)>) -> AcceptanceRules {
        AcceptanceRules::new(
            entries
                .into_iter()
                .map(|(code, node_name)| AcceptanceEntry {
                    code: code.to_string(),
                    node_name: node_name.map(str::to_string),
                })
                .collect(),
        )
    }

    #[test]
    fn test_accepts_by_code() {
        let rules = rules(vec![("disallowed-attribute", None)]);

        let err = ValidationError::new("disallowed-attribute", "m").with_node_name("onclick");
        assert!(rules.accepts(&err));

        let other = ValidationError::new("invalid-layout", "m");
        assert!(!rules.accepts(&other));
    }

    #[test]
    fn test_accepts_scoped_to_node() {
        let rules = rules(vec![("disallowed-attribute", Some("onclick"))]);

        let matching =
            ValidationError::new("disallowed-attribute", "m").with_node_name("onclick");
        assert!(rules.accepts(&matching));

        let wrong_node =
            ValidationError::new("disallowed-attribute", "m").with_node_name("style");
        assert!(!rules.accepts(&wrong_node));

        let no_node = ValidationError::new("disallowed-attribute", "m");
        assert!(!rules.accepts(&no_node));
    }

    #[test]
    fn test_classify_sets_flags() {
        let classifier = ErrorClassifier::new(rules(vec![("invalid-layout", None)]));

        let mut result = ValidationResult::checked(
            "https://example.com/a",
            vec![
                ValidationError::new("invalid-layout", "tolerated"),
                ValidationError::new("disallowed-tag", "not tolerated"),
            ],
        );
        classifier.classify(&mut result);

        match &result.outcome {
            ValidationOutcome::Checked { errors } => {
                assert!(errors[0].accepted);
                assert!(!errors[1].accepted);
            }
            _ => panic!("expected checked outcome"),
        }
        assert!(!classifier.is_valid(&result));
    }

    #[test]
    fn test_all_accepted_is_valid() {
        let classifier = ErrorClassifier::new(rules(vec![("invalid-layout", None)]));

        let mut result = ValidationResult::checked(
            "https://example.com/a",
            vec![ValidationError::new("invalid-layout", "tolerated")],
        );
        classifier.classify(&mut result);
        assert!(classifier.is_valid(&result));
    }

    #[test]
    fn test_error_free_is_valid() {
        let classifier = ErrorClassifier::default();
        let mut result = ValidationResult::checked("https://example.com/a", vec![]);
        classifier.classify(&mut result);
        assert!(classifier.is_valid(&result));
    }

    #[test]
    fn test_transport_failure_is_invalid() {
        let classifier = ErrorClassifier::default();
        let mut result = ValidationResult::transport_failure("https://example.com/a", "HTTP 502");
        classifier.classify(&mut result);
        assert!(!classifier.is_valid(&result));
    }

    #[test]
    fn test_missing_code_becomes_unclassifiable() {
        // Even an accept-everything rule set must not tolerate an error
        // without a code
        let classifier = ErrorClassifier::new(rules(vec![("", None)]));

        let mut result = ValidationResult::checked(
            "https://example.com/a",
            vec![ValidationError::new("", "shapeless")],
        );
        classifier.classify(&mut result);

        match &result.outcome {
            ValidationOutcome::Checked { errors } => {
                assert_eq!(errors[0].code, UNCLASSIFIABLE_CODE);
                assert!(!errors[0].accepted);
            }
            _ => panic!("expected checked outcome"),
        }
        assert!(!classifier.is_valid(&result));
    }
}
