//! Error types for the stepwise wizard controller.
//!
//! Resolution of the current step never fails: an unknown or unreachable
//! step simply degrades to a safe step. The errors here cover configuration
//! mistakes, API misuse, and failures reported by external collaborators.

use thiserror::Error;

use crate::schema::SchemaIssues;

/// The main error type for wizard operations.
///
/// This enum uses `#[non_exhaustive]` so new variants can be added without
/// breaking downstream matches.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WizardError {
    /// The wizard was configured incorrectly (missing store, no resolvable
    /// next step, invalid topology description).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The same step id was declared more than once.
    #[error("Duplicate step: {0}")]
    DuplicateStep(String),

    /// A step id that is not part of the topology was referenced.
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// The caller broke the API contract, e.g. pushed an end step without
    /// valid data. This is a programming error, not a user-facing condition.
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Draft data for a step did not pass its schema.
    #[error("Invalid data for step {step}: {issues}")]
    InvalidStepData {
        /// The step whose data failed validation.
        step: String,
        /// What the schema rejected.
        issues: SchemaIssues,
    },

    /// The draft or session storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The address collaborator failed to navigate.
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized `Result` type for wizard operations.
pub type Result<T> = std::result::Result<T, WizardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_configuration() {
        let error = WizardError::Configuration("no next step".to_string());
        assert_eq!(error.to_string(), "Configuration error: no next step");
    }

    #[test]
    fn test_error_display_duplicate_step() {
        let error = WizardError::DuplicateStep("one".to_string());
        assert_eq!(error.to_string(), "Duplicate step: one");
    }

    #[test]
    fn test_error_display_unknown_step() {
        let error = WizardError::UnknownStep("nope".to_string());
        assert_eq!(error.to_string(), "Unknown step: nope");
    }

    #[test]
    fn test_error_display_contract_violation() {
        let error = WizardError::ContractViolation("missing data".to_string());
        assert_eq!(error.to_string(), "Contract violation: missing data");
    }

    #[test]
    fn test_error_display_invalid_step_data() {
        let error = WizardError::InvalidStepData {
            step: "done".to_string(),
            issues: SchemaIssues::single("\"id\" is a required property"),
        };
        assert_eq!(
            error.to_string(),
            "Invalid data for step done: \"id\" is a required property"
        );
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: WizardError = json_error.into();
        assert!(error.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_error_debug_format() {
        let error = WizardError::Storage("quota exceeded".to_string());
        let debug_output = format!("{:?}", error);
        assert!(debug_output.contains("Storage"));
        assert!(debug_output.contains("quota exceeded"));
    }
}
