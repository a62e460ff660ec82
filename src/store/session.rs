//! The default draft store, backed by a session storage slot.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use super::{DraftStore, SessionStorage};
use crate::topology::StorageSlot;
use crate::{DraftData, Result, Topology};

/// The default [`DraftStore`]: drafts live in the session storage slot
/// `"{topology_id}_{instance_id}_data"`.
///
/// Entering an end step drops the ordinary steps' records; leaving an end
/// step for an ordinary step drops the end steps' records.
pub struct SessionDraftStore {
    topology: Arc<Topology>,
    storage: Arc<dyn SessionStorage>,
    key: String,
}

impl SessionDraftStore {
    /// Creates a store for one wizard instance.
    pub fn new(
        topology: Arc<Topology>,
        storage: Arc<dyn SessionStorage>,
        instance_id: &str,
    ) -> Self {
        let key = topology.storage_key(instance_id, StorageSlot::Data);
        Self {
            topology,
            storage,
            key,
        }
    }

    /// Returns the session storage key holding the drafts.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lays caller-supplied initial data underneath the stored drafts.
    ///
    /// Fields already stored win, so remounting with the same initial data
    /// keeps what the user entered since.
    ///
    /// # Errors
    ///
    /// Returns an error if session storage cannot be written.
    pub fn seed(&self, initial: &DraftData) -> Result<()> {
        self.update(|stored| initial.merged(&stored))
    }

    fn update(&self, updater: impl FnOnce(DraftData) -> DraftData) -> Result<()> {
        let mut updater = Some(updater);
        self.storage
            .update(&self.key, JsonValue::Object(Map::new()), &mut |previous| {
                let previous = DraftData::from_json_lossy(previous);
                match updater.take() {
                    Some(updater) => updater(previous).to_json(),
                    None => previous.to_json(),
                }
            })
            .map(|_| ())
    }
}

impl std::fmt::Debug for SessionDraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDraftStore")
            .field("key", &self.key)
            .finish()
    }
}

#[async_trait]
impl DraftStore for SessionDraftStore {
    fn data(&self) -> Result<Arc<DraftData>> {
        let data = match self.storage.get(&self.key)? {
            Some(value) => DraftData::from_json_lossy(value),
            None => DraftData::new(),
        };
        Ok(Arc::new(data))
    }

    async fn patch_data(&self, patch: &DraftData) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.update(|data| data.merged(patch))
    }

    async fn on_reach_end_step(&self, step: &str) -> Result<()> {
        tracing::debug!(
            step = %step,
            key = %self.key,
            "end step reached, dropping other steps' drafts"
        );
        let steps = self.topology.steps();
        self.update(|data| data.without_steps(steps.iter().map(String::as_str)))
    }

    async fn on_leave_end_step(&self, step: &str) -> Result<()> {
        tracing::debug!(step = %step, key = %self.key, "end step left, dropping end steps' drafts");
        let end = self.topology.end_steps();
        self.update(|data| data.without_steps(end.iter().map(String::as_str)))
    }
}
