//! The wizard instance: step synchronization and transitions.
//!
//! This module provides [`Wizard`], one mounted instance of a [`Topology`].
//! A wizard owns its draft data and history, reads the requested step from
//! an [`Address`], and keeps the two consistent:
//!
//! - [`Wizard::observe`] resolves the current step from scratch and fixes
//!   the address when it asks for a step that cannot be shown.
//! - [`Wizard::push`] moves to another step, optionally patching drafts.
//! - [`Wizard::go_back_link`] describes the "go back" navigation.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tracing::{debug, info, warn, Instrument};

use crate::address::{Address, LinkTarget, NavigateOptions, Query};
use crate::event::{Transition, WizardEvent};
use crate::history::History;
use crate::log::WizardLog;
use crate::resolver::{requested_step, resolve_current_step};
use crate::store::{select_draft_store, DraftStore, SessionStorage};
use crate::topology::StorageSlot;
use crate::{DraftData, Result, Topology, WizardError};

/// Default channel capacity for wizard events.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Options for [`Wizard::mount`].
#[derive(Clone, Default)]
pub struct MountOptions {
    /// Distinguishes instances of the same topology; namespaces storage.
    pub instance_id: String,
    /// The start step. Defaults to the first ordinary step.
    pub start: Option<String>,
    /// Initial draft data, seeded once into session storage.
    pub data: Option<DraftData>,
    /// The store for topologies using [`StorageKind::Custom`](crate::StorageKind::Custom).
    pub draft_store: Option<Arc<dyn DraftStore>>,
    /// Turns on verbose step diagnostics.
    pub debug: bool,
}

impl MountOptions {
    /// Creates options for the instance `instance_id`.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Self::default()
        }
    }

    /// Sets the start step.
    pub fn start(mut self, step: impl Into<String>) -> Self {
        self.start = Some(step.into());
        self
    }

    /// Sets the initial draft data.
    pub fn data(mut self, data: DraftData) -> Self {
        self.data = Some(data);
        self
    }

    /// Sets the custom draft store.
    pub fn draft_store(mut self, store: Arc<dyn DraftStore>) -> Self {
        self.draft_store = Some(store);
        self
    }

    /// Turns diagnostics on or off.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl std::fmt::Debug for MountOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountOptions")
            .field("instance_id", &self.instance_id)
            .field("start", &self.start)
            .field("data", &self.data)
            .field("draft_store", &self.draft_store.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}

/// Patches drafts and announces it. Shared by wizards and form bindings.
#[derive(Clone)]
pub(crate) struct Drafts {
    store: Arc<dyn DraftStore>,
    events: broadcast::Sender<WizardEvent>,
    wizard_id: String,
}

impl Drafts {
    pub(crate) fn data(&self) -> Result<Arc<DraftData>> {
        self.store.data()
    }

    pub(crate) async fn patch(&self, patch: &DraftData) -> Result<()> {
        self.store.patch_data(patch).await?;
        let _ = self.events.send(WizardEvent::DraftPatched {
            wizard_id: self.wizard_id.clone(),
            steps: patch.steps().map(str::to_string).collect(),
        });
        Ok(())
    }
}

/// A mounted wizard instance.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use stepwise::{
///     DraftData, JsonSchema, MemoryAddress, MemorySessionStorage, MountOptions, Topology, Wizard,
/// };
///
/// # async fn example() -> stepwise::Result<()> {
/// let topology = Arc::new(
///     Topology::builder("signup")
///         .steps(["one", "two"])
///         .end(["done"])
///         .schema("done", JsonSchema::compile(json!({"type": "object", "required": ["id"]}))?)
///         .build()?,
/// );
///
/// let address = MemoryAddress::new();
/// let mut wizard = Wizard::mount(
///     topology,
///     address.clone(),
///     Arc::new(MemorySessionStorage::new()),
///     MountOptions::new("main"),
/// )
/// .await?;
/// assert_eq!(wizard.current_step(), "one");
///
/// wizard.push("done", Some(DraftData::from_json(json!({"done": {"id": "42"}}))?)).await?;
/// wizard.observe().await?;
/// assert_eq!(wizard.current_step(), "done");
/// assert_eq!(address.param("w_signup").as_deref(), Some("done"));
/// # Ok(())
/// # }
/// ```
pub struct Wizard {
    topology: Arc<Topology>,
    instance_id: String,
    wizard_id: String,
    start: String,
    address: Box<dyn Address>,
    session: Arc<dyn SessionStorage>,
    drafts: Drafts,
    history: History,
    /// The step resolved by the last observation.
    current: Option<String>,
    transition: Transition,
    log: WizardLog,
    event_tx: broadcast::Sender<WizardEvent>,
}

impl Wizard {
    /// Mounts a wizard instance and performs the first observation.
    ///
    /// # Errors
    ///
    /// - [`WizardError::Configuration`] if the start step is not an
    ///   ordinary step, or the draft store does not match the topology's
    ///   storage kind
    /// - any error from the first [`observe`](Self::observe)
    pub async fn mount(
        topology: Arc<Topology>,
        address: impl Address + 'static,
        session: Arc<dyn SessionStorage>,
        options: MountOptions,
    ) -> Result<Self> {
        let MountOptions {
            instance_id,
            start,
            data,
            draft_store,
            debug,
        } = options;

        let start = match start {
            Some(step) => step,
            None => topology.steps().first().cloned().ok_or_else(|| {
                WizardError::Configuration(format!("wizard {} declares no steps", topology.id()))
            })?,
        };
        if !topology.is_ordinary_step(&start) {
            return Err(WizardError::Configuration(format!(
                "start step {} is not an ordinary step of wizard {}",
                start,
                topology.id()
            )));
        }

        let store = select_draft_store(&topology, &instance_id, &session, draft_store, data)?;
        let history = History::load(
            session.as_ref(),
            topology.storage_key(&instance_id, StorageSlot::History),
        )?;

        let wizard_id = format!("{}_{}", topology.id(), instance_id);
        let log = WizardLog::new(topology.id(), &instance_id, debug, &address.query());
        let (event_tx, _) = broadcast::channel(DEFAULT_EVENT_CHANNEL_CAPACITY);
        let drafts = Drafts {
            store,
            events: event_tx.clone(),
            wizard_id: wizard_id.clone(),
        };

        log.span().in_scope(|| info!(start = %start, "mounting wizard"));

        let mut wizard = Self {
            topology,
            instance_id,
            wizard_id,
            start,
            address: Box::new(address),
            session,
            drafts,
            history,
            current: None,
            transition: Transition::Forward,
            log,
            event_tx,
        };
        wizard.observe().await?;
        Ok(wizard)
    }

    /// Subscribes to wizard events.
    ///
    /// Returns a receiver that will receive all events broadcast by this
    /// wizard. Events are not persisted; if the receiver is too slow,
    /// events may be dropped.
    pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
        self.event_tx.subscribe()
    }

    /// Emits an event to all subscribers.
    ///
    /// Ignores send errors (no subscribers or channel full).
    fn emit(&self, event: WizardEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Returns the topology.
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// Returns the instance id.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Returns `"{topology_id}_{instance_id}"`, used to tag events.
    pub fn wizard_id(&self) -> &str {
        &self.wizard_id
    }

    /// Returns the start step.
    pub fn start(&self) -> &str {
        &self.start
    }

    /// Returns the current step. Before the first successful observation
    /// this is the start step.
    pub fn current_step(&self) -> &str {
        self.current.as_deref().unwrap_or(&self.start)
    }

    /// Returns the direction of the last step change.
    pub fn transition(&self) -> Transition {
        self.transition
    }

    /// Returns the visited-step history.
    pub fn history(&self) -> &[String] {
        self.history.entries()
    }

    /// Returns the instance diagnostics handle.
    pub fn log(&self) -> &WizardLog {
        &self.log
    }

    /// Returns the draft store in use.
    pub fn draft_store(&self) -> &Arc<dyn DraftStore> {
        &self.drafts.store
    }

    pub(crate) fn drafts(&self) -> &Drafts {
        &self.drafts
    }

    /// Returns the current draft data.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft store cannot be read.
    pub fn data(&self) -> Result<Arc<DraftData>> {
        self.drafts.data()
    }

    /// Returns the validated data of `step`.
    ///
    /// Steps without a schema return their raw record, or `null`.
    ///
    /// # Errors
    ///
    /// - [`WizardError::UnknownStep`] if `step` is not declared
    /// - [`WizardError::InvalidStepData`] if the data does not pass the
    ///   step's schema
    pub fn get(&self, step: &str) -> Result<JsonValue> {
        if !self.topology.contains(step) {
            return Err(WizardError::UnknownStep(step.to_string()));
        }
        let value = self.drafts.data()?.value_for(step);
        match self.topology.schema_for(step) {
            Some(schema) => schema
                .safe_parse(&value)
                .map_err(|issues| WizardError::InvalidStepData {
                    step: step.to_string(),
                    issues,
                }),
            None => Ok(value),
        }
    }

    /// Merges `patch` into the drafts.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft store fails.
    pub async fn patch_data(&self, patch: &DraftData) -> Result<()> {
        self.drafts
            .patch(patch)
            .instrument(self.log.span().clone())
            .await
    }

    /// Builds the query that shows `step`, keeping unrelated parameters.
    ///
    /// The marker is omitted for the start step.
    pub fn query_for_step(&self, base: &Query, step: &str) -> Query {
        let mut query = base.clone();
        query.remove(self.topology.step_query_key());
        if step != self.start {
            query.insert(self.topology.step_query_key().to_string(), step.to_string());
        }
        query
    }

    /// Returns the step "go back" leads to, if any.
    pub fn previous_step(&self) -> Option<String> {
        self.history
            .back_target(self.current_step(), &self.start, &self.topology)
    }

    /// Describes the "go back" navigation: a shallow, non-scrolling
    /// replace to the previous step. `None` when there is nowhere to go.
    pub fn go_back_link(&self) -> Option<LinkTarget> {
        let previous = self.previous_step()?;
        Some(LinkTarget {
            query: self.query_for_step(&self.address.query(), &previous),
            replace: true,
            shallow: true,
            scroll: false,
        })
    }

    /// Follows [`go_back_link`](Self::go_back_link), then observes.
    /// Returns false if there was nowhere to go.
    ///
    /// # Errors
    ///
    /// Returns an error if navigation or the following observation fails.
    pub async fn go_back(&mut self) -> Result<bool> {
        let Some(link) = self.go_back_link() else {
            return Ok(false);
        };
        let options = NavigateOptions {
            shallow: link.shallow,
            scroll: link.scroll,
        };
        if link.replace {
            self.address.replace(link.query, options).await?;
        } else {
            self.address.push(link.query, options).await?;
        }
        self.observe().await?;
        Ok(true)
    }

    /// Resolves the current step from the address and drafts, then brings
    /// the address and history in line with it.
    ///
    /// Safe to call any number of times: with nothing changed, a second
    /// call has no effect. Does nothing while the address is not ready.
    ///
    /// # Errors
    ///
    /// Returns an error if a collaborator fails.
    pub async fn observe(&mut self) -> Result<()> {
        let span = self.log.span().clone();
        self.observe_internal().instrument(span).await
    }

    async fn observe_internal(&mut self) -> Result<()> {
        if !self.address.is_ready() {
            debug!("address not ready, skipping observation");
            return Ok(());
        }

        let query = self.address.query();
        let marker = query.get(self.topology.step_query_key()).cloned();
        let data = self.drafts.data()?;
        let previous = self.current.clone();
        let resolved = resolve_current_step(
            requested_step(&query, &self.topology),
            &self.start,
            &data,
            previous.as_deref(),
            &self.topology,
        );
        self.log.step("resolved current step", &resolved);

        if let Some(requested) = marker.filter(|marker| *marker != resolved) {
            info!(
                requested = %requested,
                resolved = %resolved,
                "address out of sync, replacing step marker"
            );
            self.address
                .replace(self.query_for_step(&query, &resolved), NavigateOptions::shallow())
                .await?;
            self.emit(WizardEvent::Redirected {
                wizard_id: self.wizard_id.clone(),
                requested,
                resolved: resolved.clone(),
            });
        }

        if self.history.record(&resolved, &self.start, &self.topology) {
            debug!(history = ?self.history.entries(), "history updated");
            self.history.persist(self.session.as_ref())?;
        }

        if previous.as_deref() == Some(resolved.as_str()) {
            return Ok(());
        }

        if let Some(left) = previous
            .as_deref()
            .filter(|step| self.topology.is_end_step(step) && !self.topology.is_end_step(&resolved))
        {
            info!(step = %left, "left end step");
            self.drafts.store.on_leave_end_step(left).await?;
            self.emit(WizardEvent::EndStepLeft {
                wizard_id: self.wizard_id.clone(),
                step: left.to_string(),
            });
        }

        self.transition = Transition::between(previous.as_deref(), &resolved, &self.topology);
        self.emit(WizardEvent::StepChanged {
            wizard_id: self.wizard_id.clone(),
            from: previous,
            to: resolved.clone(),
            transition: self.transition,
        });
        self.current = Some(resolved);
        Ok(())
    }

    /// Navigates to `step`, first patching `data` into the drafts.
    ///
    /// Entering an end step also fires the store's end-step hook and clears
    /// the history. The new step takes effect on the next
    /// [`observe`](Self::observe).
    ///
    /// # Errors
    ///
    /// - [`WizardError::ContractViolation`] if `step` is unknown, or is an
    ///   end step with a schema and `data` does not hold valid data for it;
    ///   nothing is written in that case
    /// - any collaborator failure
    pub async fn push(&mut self, step: &str, data: Option<DraftData>) -> Result<()> {
        let span = self.log.span().clone();
        self.push_internal(step, data).instrument(span).await
    }

    async fn push_internal(&mut self, step: &str, data: Option<DraftData>) -> Result<()> {
        if !self.topology.contains(step) {
            return Err(WizardError::ContractViolation(format!(
                "cannot push unknown step {}",
                step
            )));
        }

        let is_end_step = self.topology.is_end_step(step);
        if is_end_step {
            let Some(data) = data.as_ref() else {
                warn!(step = %step, "end step pushed without data");
                return Err(WizardError::ContractViolation(format!(
                    "end step {} requires data",
                    step
                )));
            };
            if let Some(schema) = self.topology.schema_for(step) {
                if let Err(issues) = schema.safe_parse(&data.value_for(step)) {
                    warn!(step = %step, issues = %issues, "end step pushed with invalid data");
                    return Err(WizardError::ContractViolation(format!(
                        "invalid data for end step {}: {}",
                        step, issues
                    )));
                }
            }
        }

        self.log.step("push", step);
        if let Some(data) = data {
            self.drafts.patch(&data).await?;
        }

        let options = NavigateOptions {
            shallow: self.address.shallow_push(),
            scroll: false,
        };
        let query = self.query_for_step(&self.address.query(), step);
        self.address.push(query, options).await?;

        if is_end_step {
            info!(step = %step, "reached end step");
            self.drafts.store.on_reach_end_step(step).await?;
            if self.history.clear() {
                self.history.persist(self.session.as_ref())?;
            }
            self.emit(WizardEvent::EndStepReached {
                wizard_id: self.wizard_id.clone(),
                step: step.to_string(),
            });
        }
        Ok(())
    }

    /// Unmounts the wizard, removing the step marker from the address.
    ///
    /// Draft and history slots are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be updated.
    pub async fn unmount(self) -> Result<()> {
        let span = self.log.span().clone();
        self.unmount_internal().instrument(span).await
    }

    async fn unmount_internal(&self) -> Result<()> {
        info!("unmounting wizard");
        let mut query = self.address.query();
        if query.remove(self.topology.step_query_key()).is_some() {
            debug!("removing step marker");
            self.address.replace(query, NavigateOptions::shallow()).await?;
        }
        self.emit(WizardEvent::Unmounted {
            wizard_id: self.wizard_id.clone(),
        });
        Ok(())
    }
}

impl std::fmt::Debug for Wizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wizard")
            .field("wizard_id", &self.wizard_id)
            .field("start", &self.start)
            .field("current", &self.current)
            .field("history", &self.history.entries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        JsonSchema, MemoryAddress, MemoryDraftStore, MemorySessionStorage, NavigationKind,
        StorageKind,
    };
    use serde_json::json;

    fn require(field: &str) -> JsonSchema {
        JsonSchema::compile(json!({
            "type": "object",
            "properties": {field: {"type": "string", "minLength": 1}},
            "required": [field]
        }))
        .unwrap()
    }

    fn topology(linear: bool) -> Arc<Topology> {
        Arc::new(
            Topology::builder("testing")
                .steps(["one", "two", "three"])
                .end(["done"])
                .schema("one", require("name"))
                .schema("done", require("id"))
                .linear(linear)
                .build()
                .unwrap(),
        )
    }

    fn draft(value: JsonValue) -> DraftData {
        DraftData::from_json(value).unwrap()
    }

    struct Fixture {
        wizard: Wizard,
        address: MemoryAddress,
        storage: MemorySessionStorage,
    }

    async fn mount(topology: Arc<Topology>, address: MemoryAddress) -> Fixture {
        let storage = MemorySessionStorage::new();
        let wizard = Wizard::mount(
            topology,
            address.clone(),
            Arc::new(storage.clone()),
            MountOptions::new("1"),
        )
        .await
        .unwrap();
        Fixture {
            wizard,
            address,
            storage,
        }
    }

    async fn visit(fixture: &mut Fixture, step: &str) {
        fixture.address.set_param("w_testing", step);
        fixture.wizard.observe().await.unwrap();
    }

    #[tokio::test]
    async fn test_mount_starts_at_first_step() {
        let f = mount(topology(true), MemoryAddress::new()).await;
        assert_eq!(f.wizard.current_step(), "one");
        assert_eq!(f.wizard.start(), "one");
        assert_eq!(f.wizard.wizard_id(), "testing_1");
        assert!(f.address.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_mount_rejects_end_step_start() {
        let result = Wizard::mount(
            topology(true),
            MemoryAddress::new(),
            Arc::new(MemorySessionStorage::new()),
            MountOptions::new("1").start("done"),
        )
        .await;
        assert!(matches!(result, Err(WizardError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_mount_custom_storage_requires_store() {
        let topology = Arc::new(
            Topology::builder("t")
                .steps(["a"])
                .storage(StorageKind::Custom)
                .build()
                .unwrap(),
        );
        let result = Wizard::mount(
            topology,
            MemoryAddress::new(),
            Arc::new(MemorySessionStorage::new()),
            MountOptions::new("1"),
        )
        .await;
        assert!(matches!(result, Err(WizardError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_linear_gating_redirects_to_start() {
        let mut f = mount(topology(true), MemoryAddress::new()).await;
        visit(&mut f, "three").await;

        assert_eq!(f.wizard.current_step(), "one");
        assert_eq!(f.address.param("w_testing"), None);
        let navigations = f.address.navigations();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].kind, NavigationKind::Replace);
        assert!(navigations[0].options.shallow);
        assert!(!navigations[0].options.scroll);
    }

    #[tokio::test]
    async fn test_unknown_marker_is_replaced() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        f.address.set_param("tab", "x");
        visit(&mut f, "bogus").await;

        assert_eq!(f.wizard.current_step(), "one");
        let mut expected = Query::new();
        expected.insert("tab".to_string(), "x".to_string());
        assert_eq!(f.address.query(), expected);
    }

    #[tokio::test]
    async fn test_observe_is_idempotent() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        visit(&mut f, "two").await;
        let history = f.wizard.history().to_vec();
        let navigations = f.address.navigations().len();

        f.wizard.observe().await.unwrap();
        f.wizard.observe().await.unwrap();
        assert_eq!(f.wizard.current_step(), "two");
        assert_eq!(f.wizard.history(), history.as_slice());
        assert_eq!(f.address.navigations().len(), navigations);
    }

    #[tokio::test]
    async fn test_observe_skipped_when_not_ready() {
        let address = MemoryAddress::new();
        address.set_ready(false);
        address.set_param("w_testing", "bogus");
        let mut f = mount(topology(false), address).await;

        assert_eq!(f.wizard.current_step(), "one");
        assert!(f.address.navigations().is_empty());

        f.address.set_ready(true);
        f.wizard.observe().await.unwrap();
        assert_eq!(f.address.navigations().len(), 1);
    }

    #[tokio::test]
    async fn test_history_tracks_branching_visits() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        visit(&mut f, "three").await;
        visit(&mut f, "two").await;
        assert_eq!(f.wizard.history(), ["three", "two"]);
        assert_eq!(
            f.storage.get("testing_1_history").unwrap(),
            Some(json!(["three", "two"]))
        );

        f.address.remove_param("w_testing");
        f.wizard.observe().await.unwrap();
        assert!(f.wizard.history().is_empty());
    }

    #[tokio::test]
    async fn test_branching_back_link() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        assert!(f.wizard.go_back_link().is_none());

        visit(&mut f, "two").await;
        visit(&mut f, "three").await;
        let link = f.wizard.go_back_link().unwrap();
        assert_eq!(link.query.get("w_testing").map(String::as_str), Some("two"));
        assert!(link.replace && link.shallow && !link.scroll);

        assert!(f.wizard.go_back().await.unwrap());
        assert_eq!(f.wizard.current_step(), "two");
        assert_eq!(f.wizard.transition(), Transition::Backward);

        let link = f.wizard.go_back_link().unwrap();
        assert!(link.query.get("w_testing").is_none());
    }

    #[tokio::test]
    async fn test_linear_back_target() {
        let mut f = mount(topology(true), MemoryAddress::new()).await;
        f.wizard
            .patch_data(&draft(json!({"one": {"name": "x"}})))
            .await
            .unwrap();
        visit(&mut f, "three").await;
        assert_eq!(f.wizard.current_step(), "three");
        assert_eq!(f.wizard.previous_step().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_push_end_step_without_data_is_contract_violation() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        let result = f.wizard.push("done", None).await;
        assert!(matches!(result, Err(WizardError::ContractViolation(_))));

        let result = f.wizard.push("done", Some(draft(json!({"done": {}})))).await;
        assert!(matches!(result, Err(WizardError::ContractViolation(_))));

        assert!(f.address.navigations().is_empty());
        assert!(f.wizard.data().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_schemaless_end_step_still_requires_data() {
        let topology = Arc::new(
            Topology::builder("testing")
                .steps(["hello"])
                .end(["bye"])
                .build()
                .unwrap(),
        );
        let mut f = mount(topology, MemoryAddress::new()).await;
        let result = f.wizard.push("bye", None).await;
        assert!(matches!(result, Err(WizardError::ContractViolation(_))));
        assert!(f.address.navigations().is_empty());

        f.wizard.push("bye", Some(DraftData::new())).await.unwrap();
        assert_eq!(f.address.param("w_testing").as_deref(), Some("bye"));
    }

    #[tokio::test]
    async fn test_push_unknown_step_is_contract_violation() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        let result = f.wizard.push("nowhere", None).await;
        assert!(matches!(result, Err(WizardError::ContractViolation(_))));
    }

    #[tokio::test]
    async fn test_push_ordinary_step() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        f.wizard
            .push("two", Some(draft(json!({"one": {"name": "x"}}))))
            .await
            .unwrap();

        let navigations = f.address.navigations();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].kind, NavigationKind::Push);
        assert!(!navigations[0].options.scroll);
        assert!(!navigations[0].options.shallow);
        assert_eq!(f.address.param("w_testing").as_deref(), Some("two"));
        assert!(f.wizard.data().unwrap().contains("one"));

        f.wizard.observe().await.unwrap();
        assert_eq!(f.wizard.current_step(), "two");
        assert_eq!(f.wizard.transition(), Transition::Forward);
    }

    #[tokio::test]
    async fn test_push_shallow_policy_comes_from_address() {
        let address = MemoryAddress::new();
        address.set_shallow_push(true);
        let mut f = mount(topology(false), address).await;
        f.wizard.push("two", None).await.unwrap();
        assert!(f.address.navigations()[0].options.shallow);
    }

    #[tokio::test]
    async fn test_push_to_start_omits_marker() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        visit(&mut f, "two").await;
        f.wizard.push("one", None).await.unwrap();
        assert_eq!(f.address.param("w_testing"), None);
    }

    #[tokio::test]
    async fn test_push_end_step_prunes_and_clears_history() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        f.wizard
            .patch_data(&draft(json!({"one": {"name": "x"}, "two": {"b": 1}})))
            .await
            .unwrap();
        visit(&mut f, "two").await;
        assert!(!f.wizard.history().is_empty());

        let mut events = f.wizard.subscribe();
        f.wizard
            .push("done", Some(draft(json!({"done": {"id": "42"}}))))
            .await
            .unwrap();
        assert!(f.wizard.history().is_empty());
        assert_eq!(f.wizard.data().unwrap().to_json(), json!({"done": {"id": "42"}}));

        f.wizard.observe().await.unwrap();
        assert_eq!(f.wizard.current_step(), "done");
        assert!(f.wizard.go_back_link().is_none());

        let mut saw_end = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, WizardEvent::EndStepReached { ref step, .. } if step == "done") {
                saw_end = true;
            }
        }
        assert!(saw_end);
    }

    #[tokio::test]
    async fn test_leaving_end_step_prunes_end_data() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        f.wizard
            .push("done", Some(draft(json!({"done": {"id": "42"}}))))
            .await
            .unwrap();
        f.wizard.observe().await.unwrap();

        let mut events = f.wizard.subscribe();
        f.address.back();
        f.wizard.observe().await.unwrap();

        assert_eq!(f.wizard.current_step(), "one");
        assert!(f.wizard.data().unwrap().is_empty());
        let event = events.try_recv().unwrap();
        assert!(matches!(event, WizardEvent::EndStepLeft { ref step, .. } if step == "done"));
    }

    #[tokio::test]
    async fn test_stale_end_marker_falls_back_to_previous() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        visit(&mut f, "two").await;
        visit(&mut f, "done").await;
        assert_eq!(f.wizard.current_step(), "two");
        assert_eq!(f.address.param("w_testing").as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_get_validates() {
        let f = mount(topology(false), MemoryAddress::new()).await;
        assert!(matches!(
            f.wizard.get("one"),
            Err(WizardError::InvalidStepData { ref step, .. }) if step == "one"
        ));
        assert_eq!(f.wizard.get("two").unwrap(), JsonValue::Null);
        assert!(matches!(f.wizard.get("zzz"), Err(WizardError::UnknownStep(_))));

        f.wizard
            .patch_data(&draft(json!({"one": {"name": "bob"}})))
            .await
            .unwrap();
        assert_eq!(f.wizard.get("one").unwrap(), json!({"name": "bob"}));
    }

    #[tokio::test]
    async fn test_initial_data_seeds_session() {
        let storage = MemorySessionStorage::new();
        let wizard = Wizard::mount(
            topology(true),
            MemoryAddress::new(),
            Arc::new(storage.clone()),
            MountOptions::new("1").data(draft(json!({"one": {"name": "seed"}}))),
        )
        .await
        .unwrap();
        assert_eq!(wizard.get("one").unwrap(), json!({"name": "seed"}));
        assert!(storage.get("testing_1_data").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_custom_store_receives_patches() {
        let topology = Arc::new(
            Topology::builder("t")
                .steps(["a", "b"])
                .end(["z"])
                .storage(StorageKind::Custom)
                .build()
                .unwrap(),
        );
        let store = MemoryDraftStore::pruning(Arc::clone(&topology));
        let storage = MemorySessionStorage::new();
        let mut wizard = Wizard::mount(
            topology,
            MemoryAddress::new(),
            Arc::new(storage.clone()),
            MountOptions::new("1").draft_store(Arc::new(store.clone())),
        )
        .await
        .unwrap();

        wizard
            .push("b", Some(draft(json!({"a": {"x": 1}}))))
            .await
            .unwrap();
        assert_eq!(store.patch_count(), 1);
        assert!(storage.get("t_1_data").unwrap().is_none());

        wizard.push("z", Some(DraftData::new())).await.unwrap();
        assert!(store.data().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_navigation_propagates() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        f.address.fail_navigation(true);
        let result = f.wizard.push("two", None).await;
        assert!(matches!(result, Err(WizardError::Navigation(_))));
    }

    #[tokio::test]
    async fn test_unmount_removes_marker() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        f.address.set_param("tab", "x");
        visit(&mut f, "two").await;
        let mut events = f.wizard.subscribe();

        f.wizard.unmount().await.unwrap();
        assert_eq!(f.address.param("w_testing"), None);
        assert_eq!(f.address.param("tab").as_deref(), Some("x"));
        assert!(matches!(events.try_recv(), Ok(WizardEvent::Unmounted { .. })));
        assert!(f.storage.get("testing_1_history").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_step_changed_events() {
        let mut f = mount(topology(false), MemoryAddress::new()).await;
        let mut events = f.wizard.subscribe();
        visit(&mut f, "three").await;
        visit(&mut f, "two").await;

        let first = events.recv().await.unwrap();
        assert_eq!(
            first,
            WizardEvent::StepChanged {
                wizard_id: "testing_1".to_string(),
                from: Some("one".to_string()),
                to: "three".to_string(),
                transition: Transition::Forward,
            }
        );
        let second = events.recv().await.unwrap();
        assert!(matches!(
            second,
            WizardEvent::StepChanged { transition: Transition::Backward, .. }
        ));
    }

    #[tokio::test]
    async fn test_debug_query_enables_log() {
        let address = MemoryAddress::new();
        address.set_param("debug", "");
        let f = mount(topology(false), address).await;
        assert!(f.wizard.log().enabled());
    }
}
