//! Validation schemas attached to wizard steps.
//!
//! A [`Schema`] decides whether a step's draft record is complete. Schemas
//! are external collaborators: the wizard only ever calls
//! [`Schema::safe_parse`] and looks at the outcome. Two implementations are
//! provided:
//!
//! - [`JsonSchema`]: a compiled JSON Schema document
//! - [`FnSchema`]: a closure, handy for tests and one-off rules

use std::fmt;

use jsonschema::Validator;
use serde_json::Value as JsonValue;

use crate::{Result, WizardError};

/// The reasons a value was rejected by a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssues {
    messages: Vec<String>,
}

impl SchemaIssues {
    /// Creates an issue list from individual messages.
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    /// Creates an issue list holding a single message.
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    /// Returns the individual messages.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl fmt::Display for SchemaIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages.join("; "))
    }
}

/// A validator for one step's record.
///
/// `safe_parse` never panics: it returns the normalized value on success
/// and the list of issues on failure. A step with no recorded data is
/// validated as [`JsonValue::Null`].
///
/// # Object Safety
///
/// This trait is object-safe; topologies hold schemas as `Arc<dyn Schema>`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use stepwise::{FnSchema, Schema, SchemaIssues};
///
/// let has_name = FnSchema::new(|value: &serde_json::Value| match value.get("name") {
///     Some(name) if name.is_string() => Ok(value.clone()),
///     _ => Err(SchemaIssues::single("name is required")),
/// });
///
/// assert!(has_name.safe_parse(&json!({"name": "bob"})).is_ok());
/// assert!(has_name.safe_parse(&json!({})).is_err());
/// ```
pub trait Schema: fmt::Debug + Send + Sync {
    /// Validates `value`, returning the normalized data or the issues found.
    fn safe_parse(&self, value: &JsonValue) -> std::result::Result<JsonValue, SchemaIssues>;

    /// Returns true if `value` passes validation.
    fn is_valid(&self, value: &JsonValue) -> bool {
        self.safe_parse(value).is_ok()
    }
}

/// A compiled JSON Schema document.
pub struct JsonSchema {
    source: JsonValue,
    validator: Validator,
}

impl JsonSchema {
    /// Compiles a JSON Schema document.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Configuration`] if the document is not a
    /// valid schema.
    pub fn compile(source: JsonValue) -> Result<Self> {
        let validator = jsonschema::validator_for(&source)
            .map_err(|e| WizardError::Configuration(format!("invalid JSON schema: {}", e)))?;
        Ok(Self { source, validator })
    }

    /// Returns the schema document this validator was compiled from.
    pub fn source(&self) -> &JsonValue {
        &self.source
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("source", &self.source)
            .finish()
    }
}

impl Schema for JsonSchema {
    fn safe_parse(&self, value: &JsonValue) -> std::result::Result<JsonValue, SchemaIssues> {
        let messages: Vec<String> = self
            .validator
            .iter_errors(value)
            .map(|error| error.to_string())
            .collect();

        if messages.is_empty() {
            Ok(value.clone())
        } else {
            Err(SchemaIssues::new(messages))
        }
    }
}

/// A schema backed by a closure.
pub struct FnSchema<F> {
    parse: F,
}

impl<F> FnSchema<F>
where
    F: Fn(&JsonValue) -> std::result::Result<JsonValue, SchemaIssues> + Send + Sync,
{
    /// Wraps `parse` as a schema.
    pub fn new(parse: F) -> Self {
        Self { parse }
    }
}

impl<F> fmt::Debug for FnSchema<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSchema").finish_non_exhaustive()
    }
}

impl<F> Schema for FnSchema<F>
where
    F: Fn(&JsonValue) -> std::result::Result<JsonValue, SchemaIssues> + Send + Sync,
{
    fn safe_parse(&self, value: &JsonValue) -> std::result::Result<JsonValue, SchemaIssues> {
        (self.parse)(value)
    }
}
