//! Draft data: partial per-step records persisted across navigation.
//!
//! Draft data maps a step id to a partial record of that step's fields.
//! Patches merge per step and then per field, so saving one field never
//! clobbers the rest of a step's record.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A single step's partial record.
pub type StepRecord = Map<String, JsonValue>;

/// Partial form data for every step of a wizard instance.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use stepwise::DraftData;
///
/// let first = DraftData::from_json(json!({"a": {"x": 1}})).unwrap();
/// let second = DraftData::from_json(json!({"a": {"y": 2}})).unwrap();
///
/// let merged = first.merged(&second);
/// assert_eq!(merged.to_json(), json!({"a": {"x": 1, "y": 2}}));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftData {
    steps: BTreeMap<String, StepRecord>,
}

impl DraftData {
    /// Creates empty draft data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds draft data from a JSON object of step records.
    ///
    /// # Errors
    ///
    /// Fails if the value is not an object whose values are all objects.
    pub fn from_json(value: JsonValue) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Builds draft data from stored JSON, keeping every well-formed record.
    ///
    /// Records that are not objects are dropped with a warning instead of
    /// discarding the whole value. A value that is not an object at all
    /// yields empty data.
    pub fn from_json_lossy(value: JsonValue) -> Self {
        let JsonValue::Object(entries) = value else {
            tracing::warn!("stored draft data is not an object, starting empty");
            return Self::new();
        };
        let steps = entries
            .into_iter()
            .filter_map(|(step, record)| match record {
                JsonValue::Object(record) => Some((step, record)),
                other => {
                    tracing::warn!(step = %step, value = %other, "dropping malformed draft record");
                    None
                }
            })
            .collect();
        Self { steps }
    }

    /// Converts the draft data to a JSON object.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.steps
                .iter()
                .map(|(step, record)| (step.clone(), JsonValue::Object(record.clone())))
                .collect(),
        )
    }

    /// Builder-style helper that sets a step's record.
    pub fn with_step(mut self, step: impl Into<String>, record: StepRecord) -> Self {
        self.steps.insert(step.into(), record);
        self
    }

    /// Returns the record for `step`, if any.
    pub fn get(&self, step: &str) -> Option<&StepRecord> {
        self.steps.get(step)
    }

    /// Returns the record for `step` as a JSON value, or `Null` when the
    /// step has no data. This is the value handed to schemas.
    pub fn value_for(&self, step: &str) -> JsonValue {
        self.steps
            .get(step)
            .map(|record| JsonValue::Object(record.clone()))
            .unwrap_or(JsonValue::Null)
    }

    /// Returns true if `step` has a record.
    pub fn contains(&self, step: &str) -> bool {
        self.steps.contains_key(step)
    }

    /// Returns the step ids that have records.
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }

    /// Returns the number of steps with records.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step has a record.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Merges `patch` into a copy of `self`, field by field within each step.
    pub fn merged(&self, patch: &DraftData) -> DraftData {
        let mut next = self.clone();
        for (step, fields) in &patch.steps {
            let record = next.steps.entry(step.clone()).or_default();
            for (field, value) in fields {
                record.insert(field.clone(), value.clone());
            }
        }
        next
    }

    /// Merges `patch` into shared draft data.
    ///
    /// An empty patch returns the same `Arc`, so callers can detect that
    /// nothing changed with [`Arc::ptr_eq`].
    pub fn patched(self: &Arc<Self>, patch: &DraftData) -> Arc<DraftData> {
        if patch.is_empty() {
            return Arc::clone(self);
        }
        Arc::new(self.merged(patch))
    }

    /// Returns a copy without the records of the given steps.
    pub fn without_steps<'a>(&self, steps: impl IntoIterator<Item = &'a str>) -> DraftData {
        let mut next = self.clone();
        for step in steps {
            next.steps.remove(step);
        }
        next
    }
}
