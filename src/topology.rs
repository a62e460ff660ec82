//! Step topology: the static shape of a wizard.
//!
//! This module provides [`Topology`] and [`TopologyBuilder`]. A topology
//! lists the ordered ordinary steps, the unordered end steps, the schema
//! attached to each data-bearing step, whether the flow is linear, and
//! where drafts are stored. It never changes after construction.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Result, Schema, WizardError};

/// Where the draft data of a wizard lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// The built-in per-session keyed slot.
    #[default]
    Session,
    /// A caller-supplied [`DraftStore`](crate::DraftStore) handed over at mount.
    Custom,
}

/// The slots a wizard instance keeps in session storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageSlot {
    /// Draft data.
    Data,
    /// Visited step history.
    History,
}

impl StorageSlot {
    fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::History => "history",
        }
    }
}

/// The static description of a wizard's steps.
///
/// Ordinary steps are ordered; the order drives linear gating, the default
/// next step, and the back target. End steps are terminal and can only be
/// entered once their data validates.
///
/// # Construction
///
/// ```
/// use serde_json::json;
/// use stepwise::{JsonSchema, Topology};
///
/// let topology = Topology::builder("signup")
///     .steps(["one", "two"])
///     .end(["done"])
///     .schema("one", JsonSchema::compile(json!({"type": "object", "required": ["name"]}))?)
///     .linear(true)
///     .build()?;
///
/// assert_eq!(topology.all_steps(), ["one", "two", "done"]);
/// assert!(topology.is_end_step("done"));
/// assert_eq!(topology.step_query_key(), "w_signup");
/// # Ok::<(), stepwise::WizardError>(())
/// ```
pub struct Topology {
    id: String,
    steps: Vec<String>,
    end: Vec<String>,
    all_steps: Vec<String>,
    index: HashMap<String, usize>,
    end_set: HashSet<String>,
    schemas: HashMap<String, Arc<dyn Schema>>,
    linear: bool,
    storage: StorageKind,
    step_query_key: String,
}

impl Topology {
    /// Creates a new topology builder for the wizard `id`.
    pub fn builder(id: impl Into<String>) -> TopologyBuilder {
        TopologyBuilder::new(id)
    }

    /// Returns the wizard id, used to namespace query and storage keys.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the ordinary steps in declared order.
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Returns the end steps in declared order.
    pub fn end_steps(&self) -> &[String] {
        &self.end
    }

    /// Returns ordinary steps followed by end steps.
    pub fn all_steps(&self) -> &[String] {
        &self.all_steps
    }

    /// Returns true if the flow must be completed in order.
    pub fn is_linear(&self) -> bool {
        self.linear
    }

    /// Returns where drafts are stored.
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    /// Returns true if `step` is any declared step.
    pub fn contains(&self, step: &str) -> bool {
        self.index.contains_key(step)
    }

    /// Returns true if `step` is an end step.
    pub fn is_end_step(&self, step: &str) -> bool {
        self.end_set.contains(step)
    }

    /// Returns true if `step` is an ordinary (sequenced) step.
    pub fn is_ordinary_step(&self, step: &str) -> bool {
        self.contains(step) && !self.is_end_step(step)
    }

    /// Returns true if `step` has a schema attached.
    pub fn has_data(&self, step: &str) -> bool {
        self.schemas.contains_key(step)
    }

    /// Returns the end steps that carry validated data.
    pub fn end_steps_with_data(&self) -> Vec<&str> {
        self.end
            .iter()
            .filter(|step| self.has_data(step))
            .map(String::as_str)
            .collect()
    }

    /// Returns the schema attached to `step`, if any.
    pub fn schema_for(&self, step: &str) -> Option<&dyn Schema> {
        self.schemas.get(step).map(|schema| schema.as_ref())
    }

    /// Returns the position of `step` within [`all_steps`](Self::all_steps).
    pub fn index_of(&self, step: &str) -> Option<usize> {
        self.index.get(step).copied()
    }

    /// Returns the ordinary step declared right after `step`.
    pub fn next_step(&self, step: &str) -> Option<&str> {
        let position = self.steps.iter().position(|s| s == step)?;
        self.steps.get(position + 1).map(String::as_str)
    }

    /// Returns the ordinary step declared right before `step`.
    pub fn previous_ordinary_step(&self, step: &str) -> Option<&str> {
        let position = self.steps.iter().position(|s| s == step)?;
        position
            .checked_sub(1)
            .and_then(|prev| self.steps.get(prev))
            .map(String::as_str)
    }

    /// Returns the query parameter that carries the current step.
    pub fn step_query_key(&self) -> &str {
        &self.step_query_key
    }

    /// Returns the session storage key for an instance's slot.
    ///
    /// The layout is `"{topology_id}_{instance_id}_{data|history}"`.
    pub fn storage_key(&self, instance_id: &str, slot: StorageSlot) -> String {
        format!("{}_{}_{}", self.id, instance_id, slot.as_str())
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schema_steps: Vec<&String> = self.schemas.keys().collect();
        schema_steps.sort();
        f.debug_struct("Topology")
            .field("id", &self.id)
            .field("steps", &self.steps)
            .field("end", &self.end)
            .field("schemas", &schema_steps)
            .field("linear", &self.linear)
            .field("storage", &self.storage)
            .finish()
    }
}

/// Builder for constructing [`Topology`] instances.
///
/// All checks run in [`build`](Self::build), so configuration mistakes
/// surface once at setup time rather than during navigation.
pub struct TopologyBuilder {
    id: String,
    steps: Vec<String>,
    end: Vec<String>,
    schemas: Vec<(String, Arc<dyn Schema>)>,
    linear: bool,
    storage: StorageKind,
}

impl TopologyBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            end: Vec::new(),
            schemas: Vec::new(),
            linear: false,
            storage: StorageKind::default(),
        }
    }

    /// Appends ordinary steps, in order.
    pub fn steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps.extend(steps.into_iter().map(Into::into));
        self
    }

    /// Appends end steps.
    pub fn end<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.end.extend(steps.into_iter().map(Into::into));
        self
    }

    /// Attaches a schema to a step.
    pub fn schema(self, step: impl Into<String>, schema: impl Schema + 'static) -> Self {
        self.shared_schema(step, Arc::new(schema))
    }

    /// Attaches an already shared schema to a step.
    pub fn shared_schema(mut self, step: impl Into<String>, schema: Arc<dyn Schema>) -> Self {
        self.schemas.push((step.into(), schema));
        self
    }

    /// Sets whether the flow is linear. Defaults to branching.
    pub fn linear(mut self, linear: bool) -> Self {
        self.linear = linear;
        self
    }

    /// Sets where drafts are stored. Defaults to [`StorageKind::Session`].
    pub fn storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    /// Builds the topology, validating the configuration.
    ///
    /// # Errors
    ///
    /// - [`WizardError::DuplicateStep`] if a step id is declared twice,
    ///   within or across the ordinary and end lists, or gets two schemas
    /// - [`WizardError::UnknownStep`] if a schema names an undeclared step
    /// - [`WizardError::Configuration`] if there are no ordinary steps
    pub fn build(self) -> Result<Topology> {
        if self.steps.is_empty() {
            return Err(WizardError::Configuration(format!(
                "wizard {} declares no steps",
                self.id
            )));
        }

        let all_steps: Vec<String> = self.steps.iter().chain(&self.end).cloned().collect();
        let mut index = HashMap::with_capacity(all_steps.len());
        for (position, step) in all_steps.iter().enumerate() {
            if index.insert(step.clone(), position).is_some() {
                return Err(WizardError::DuplicateStep(step.clone()));
            }
        }

        let mut schemas = HashMap::with_capacity(self.schemas.len());
        for (step, schema) in self.schemas {
            if !index.contains_key(&step) {
                return Err(WizardError::UnknownStep(step));
            }
            if schemas.insert(step.clone(), schema).is_some() {
                return Err(WizardError::DuplicateStep(step));
            }
        }

        let end_set = self.end.iter().cloned().collect();
        let step_query_key = format!("w_{}", self.id);

        Ok(Topology {
            id: self.id,
            steps: self.steps,
            end: self.end,
            all_steps,
            index,
            end_set,
            schemas,
            linear: self.linear,
            storage: self.storage,
            step_query_key,
        })
    }
}
