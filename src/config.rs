//! Declarative topology configuration.
//!
//! A [`TopologyConfig`] describes a wizard as data, with JSON Schema
//! documents for the validated steps:
//!
//! ```
//! use stepwise::{Topology, TopologyConfig};
//!
//! let config = TopologyConfig::from_json(r#"{
//!     "id": "signup",
//!     "steps": ["one", "two"],
//!     "end": ["done"],
//!     "linear": true,
//!     "schema": {
//!         "one": {"type": "object", "required": ["name"]}
//!     }
//! }"#)?;
//!
//! let topology = Topology::from_config(config)?;
//! assert!(topology.is_linear());
//! assert!(topology.has_data("one"));
//! # Ok::<(), stepwise::WizardError>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{JsonSchema, Result, StorageKind, Topology, WizardError};

/// Serializable description of a [`Topology`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyConfig {
    /// Wizard id.
    pub id: String,
    /// Ordinary steps, in order.
    pub steps: Vec<String>,
    /// End steps.
    #[serde(default)]
    pub end: Vec<String>,
    /// Whether the flow is linear.
    #[serde(default)]
    pub linear: bool,
    /// Where drafts are stored.
    #[serde(default)]
    pub storage: StorageKind,
    /// JSON Schema documents keyed by step.
    #[serde(default)]
    pub schema: BTreeMap<String, JsonValue>,
}

impl TopologyConfig {
    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Configuration`] if the text is not a valid
    /// configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| WizardError::Configuration(format!("invalid wizard configuration: {}", e)))
    }
}

impl Topology {
    /// Builds a topology from its declarative configuration, compiling
    /// every schema document.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Configuration`] for an uncompilable schema,
    /// plus every error [`TopologyBuilder::build`](crate::TopologyBuilder::build)
    /// can return.
    pub fn from_config(config: TopologyConfig) -> Result<Topology> {
        let mut builder = Topology::builder(config.id)
            .steps(config.steps)
            .end(config.end)
            .linear(config.linear)
            .storage(config.storage);

        for (step, document) in config.schema {
            let schema = JsonSchema::compile(document).map_err(|e| {
                WizardError::Configuration(format!("schema for step {}: {}", step, e))
            })?;
            builder = builder.schema(step, schema);
        }

        builder.build()
    }
}
