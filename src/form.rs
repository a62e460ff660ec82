//! Step-bound form bindings.
//!
//! A [`FormBinding`] holds the in-progress values of one step's form. It is
//! hydrated from the drafts, saves back to them without writing the same
//! values twice, and on submit moves the wizard to the next step.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use stepwise::{
//!     FormBinding, FormOptions, MemoryAddress, MemorySessionStorage, MountOptions, Topology,
//!     Wizard,
//! };
//!
//! # async fn example() -> stepwise::Result<()> {
//! let topology = Arc::new(
//!     Topology::builder("signup")
//!         .steps(["one", "two"])
//!         .linear(true)
//!         .build()?,
//! );
//! let mut wizard = Wizard::mount(
//!     topology,
//!     MemoryAddress::new(),
//!     Arc::new(MemorySessionStorage::new()),
//!     MountOptions::new("main"),
//! )
//! .await?;
//!
//! let mut form = FormBinding::new(&wizard, "one", FormOptions::default())?;
//! form.set_value("name", json!("bob"));
//! form.submit(&mut wizard).await?;
//!
//! wizard.observe().await?;
//! assert_eq!(wizard.current_step(), "two");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::log::WizardLog;
use crate::wizard::Drafts;
use crate::{DraftData, Result, StepRecord, Topology, Wizard, WizardError};

/// Replaces the default "go to the next step" behavior of
/// [`FormBinding::submit`].
#[async_trait]
pub trait SubmitHook: Send + Sync {
    /// Called with the validated values after they were saved.
    async fn on_submit(&self, wizard: &mut Wizard, step: &str, values: &StepRecord) -> Result<()>;
}

/// Options for [`FormBinding::new`].
#[derive(Clone, Default)]
pub struct FormOptions {
    /// Initial values; persisted drafts win over them.
    pub default_values: StepRecord,
    /// The step to go to on submit.
    pub next_step: Option<String>,
    /// Runs instead of pushing the next step on submit.
    pub on_submit: Option<Arc<dyn SubmitHook>>,
}

impl FormOptions {
    /// Sets the default values.
    pub fn default_values(mut self, values: StepRecord) -> Self {
        self.default_values = values;
        self
    }

    /// Sets the step to go to on submit.
    pub fn next_step(mut self, step: impl Into<String>) -> Self {
        self.next_step = Some(step.into());
        self
    }

    /// Sets the submit hook.
    pub fn on_submit(mut self, hook: Arc<dyn SubmitHook>) -> Self {
        self.on_submit = Some(hook);
        self
    }
}

impl std::fmt::Debug for FormOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormOptions")
            .field("default_values", &self.default_values)
            .field("next_step", &self.next_step)
            .field("on_submit", &self.on_submit.is_some())
            .finish()
    }
}

/// The form of one wizard step.
///
/// Dropping a binding that was neither submitted nor
/// [abandoned](Self::abandon) saves its values in the background, when a
/// tokio runtime is available.
pub struct FormBinding {
    step: String,
    topology: Arc<Topology>,
    drafts: Drafts,
    log: WizardLog,
    values: StepRecord,
    /// Fingerprint of the last values handed to the store.
    saved: Option<String>,
    next_step: Option<String>,
    on_submit: Option<Arc<dyn SubmitHook>>,
    settled: bool,
}

impl FormBinding {
    /// Binds a form to `step` of `wizard`.
    ///
    /// # Errors
    ///
    /// - [`WizardError::UnknownStep`] if `step` is not declared
    /// - an error if the drafts cannot be read
    pub fn new(wizard: &Wizard, step: &str, options: FormOptions) -> Result<Self> {
        let topology = Arc::clone(wizard.topology());
        if !topology.contains(step) {
            return Err(WizardError::UnknownStep(step.to_string()));
        }

        let drafts = wizard.drafts().clone();
        let mut values = options.default_values;
        if let Some(persisted) = drafts.data()?.get(step) {
            values.extend(persisted.clone());
        }

        Ok(Self {
            step: step.to_string(),
            topology,
            drafts,
            log: wizard.log().clone(),
            values,
            saved: None,
            next_step: options.next_step,
            on_submit: options.on_submit,
            settled: false,
        })
    }

    /// Returns the bound step.
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Returns the current values.
    pub fn values(&self) -> &StepRecord {
        &self.values
    }

    /// Sets one field.
    pub fn set_value(&mut self, field: impl Into<String>, value: JsonValue) {
        self.values.insert(field.into(), value);
    }

    /// Sets several fields, keeping the others.
    pub fn set_values(&mut self, values: StepRecord) {
        self.values.extend(values);
    }

    /// Resolves the step a submit leads to.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Configuration`] if no next step is set and
    /// the flow is branching, or the step is the last one.
    pub fn next_step(&self) -> Result<String> {
        if let Some(step) = &self.next_step {
            return Ok(step.clone());
        }
        if self.topology.is_linear() {
            if let Some(step) = self.topology.next_step(&self.step) {
                return Ok(step.to_string());
            }
        }
        Err(WizardError::Configuration(format!(
            "no next step for step {}; set FormOptions::next_step or an on_submit hook",
            self.step
        )))
    }

    /// Saves the values into the drafts unless the same values were already
    /// saved. Returns true if a patch was issued.
    ///
    /// # Errors
    ///
    /// Returns the store's error. The next call will try again.
    pub async fn save_state(&mut self) -> Result<bool> {
        let fingerprint = fingerprint(&self.values)?;
        if self.saved.as_deref() == Some(fingerprint.as_str()) {
            debug!(step = %self.step, "values unchanged, skipping save");
            return Ok(false);
        }

        self.saved = Some(fingerprint);
        self.log.step("saving state", &self.step);
        let patch = DraftData::new().with_step(self.step.clone(), self.values.clone());
        if let Err(e) = self.drafts.patch(&patch).await {
            self.saved = None;
            return Err(e);
        }
        Ok(true)
    }

    /// Saves the values on a best-effort basis and releases the binding.
    /// Failures are logged, not returned.
    pub async fn abandon(mut self) {
        self.settled = true;
        if let Err(e) = self.save_state().await {
            warn!(step = %self.step, error = %e, "failed to save draft of abandoned form");
        }
    }

    /// Validates and saves the values, then runs the submit hook or pushes
    /// the next step.
    ///
    /// # Errors
    ///
    /// - [`WizardError::InvalidStepData`] if the values do not pass the
    ///   step's schema; nothing is saved
    /// - [`WizardError::Configuration`] if there is no hook and no next step
    /// - any error from the store, the hook, or [`Wizard::push`]
    pub async fn submit(&mut self, wizard: &mut Wizard) -> Result<()> {
        let values = JsonValue::Object(self.values.clone());
        if let Some(schema) = self.topology.schema_for(&self.step) {
            schema
                .safe_parse(&values)
                .map_err(|issues| WizardError::InvalidStepData {
                    step: self.step.clone(),
                    issues,
                })?;
        }

        self.save_state().await?;

        match self.on_submit.clone() {
            Some(hook) => hook.on_submit(wizard, &self.step, &self.values).await?,
            None => {
                let next = self.next_step()?;
                wizard.push(&next, None).await?;
            }
        }
        self.settled = true;
        Ok(())
    }
}

impl Drop for FormBinding {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let unchanged = fingerprint(&self.values)
            .map(|fingerprint| self.saved.as_deref() == Some(fingerprint.as_str()))
            .unwrap_or(false);
        if unchanged {
            return;
        }

        let step = self.step.clone();
        let patch = DraftData::new().with_step(step.clone(), self.values.clone());
        let drafts = self.drafts.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = drafts.patch(&patch).await {
                        warn!(step = %step, error = %e, "failed to save draft of dropped form");
                    }
                });
            }
            Err(_) => warn!(step = %step, "no async runtime, draft of dropped form not saved"),
        }
    }
}

impl std::fmt::Debug for FormBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormBinding")
            .field("step", &self.step)
            .field("values", &self.values)
            .field("next_step", &self.next_step)
            .finish_non_exhaustive()
    }
}

/// SHA-256 of the values' JSON serialization, hex encoded.
fn fingerprint(values: &StepRecord) -> Result<String> {
    let serialized = serde_json::to_vec(values)?;
    Ok(format!("{:x}", Sha256::digest(&serialized)))
}
