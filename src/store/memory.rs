//! In-memory storage implementations.
//!
//! This module provides [`MemorySessionStorage`] and [`MemoryDraftStore`],
//! thread-safe in-memory collaborators suitable for tests, demos, and
//! embedding the wizard outside a browser.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::{DraftStore, SessionStorage};
use crate::{DraftData, Result, Topology, WizardError};

/// An in-memory implementation of [`SessionStorage`].
///
/// This implementation uses `Arc<RwLock<...>>` internally, making it cheap
/// to clone; clones share the same slots.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use stepwise::{MemorySessionStorage, SessionStorage};
///
/// let storage = MemorySessionStorage::new();
/// storage.update("slot", json!(0), &mut |n| json!(n.as_i64().unwrap_or(0) + 1)).unwrap();
/// assert_eq!(storage.get("slot").unwrap(), Some(json!(1)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStorage {
    slots: Arc<RwLock<HashMap<String, JsonValue>>>,
}

impl MemorySessionStorage {
    /// Creates a new, empty session storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of slots currently stored.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no slot is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Removes every slot.
    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn update(
        &self,
        key: &str,
        default: JsonValue,
        updater: &mut dyn FnMut(JsonValue) -> JsonValue,
    ) -> Result<JsonValue> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let previous = slots.remove(key).unwrap_or(default);
        let next = updater(previous);
        slots.insert(key.to_string(), next.clone());
        Ok(next)
    }
}

/// An in-memory custom [`DraftStore`].
///
/// Stands in for a caller-supplied store (for example one that mirrors
/// drafts to a server). Clones share the same drafts. Built with
/// [`pruning`](Self::pruning), it drops ordinary-step records on entering an
/// end step and end-step records on leaving one, like the default store;
/// built with [`new`](Self::new), the lifecycle hooks do nothing.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    data: RwLock<Arc<DraftData>>,
    topology: Option<Arc<Topology>>,
    patches: AtomicUsize,
    fail_next_patch: AtomicBool,
}

impl MemoryDraftStore {
    /// Creates an empty store whose lifecycle hooks do nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that prunes drafts on end-step transitions.
    pub fn pruning(topology: Arc<Topology>) -> Self {
        Self {
            inner: Arc::new(Inner {
                topology: Some(topology),
                ..Inner::default()
            }),
        }
    }

    /// Replaces the drafts wholesale.
    pub fn set(&self, data: DraftData) {
        *self.inner.data.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(data);
    }

    /// Returns how many patches were applied.
    ///
    /// Useful for testing.
    pub fn patch_count(&self) -> usize {
        self.inner.patches.load(Ordering::SeqCst)
    }

    /// Makes the next [`patch_data`](DraftStore::patch_data) call fail.
    ///
    /// Useful for testing.
    pub fn fail_next_patch(&self) {
        self.inner.fail_next_patch.store(true, Ordering::SeqCst);
    }

    fn prune<'a>(&self, steps: impl IntoIterator<Item = &'a String>) {
        let mut data = self.inner.data.write().unwrap_or_else(PoisonError::into_inner);
        *data = Arc::new(data.without_steps(steps.into_iter().map(String::as_str)));
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    fn data(&self) -> Result<Arc<DraftData>> {
        let data = self.inner.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(&data))
    }

    async fn patch_data(&self, patch: &DraftData) -> Result<()> {
        if self.inner.fail_next_patch.swap(false, Ordering::SeqCst) {
            return Err(WizardError::Storage("draft store unavailable".to_string()));
        }

        let mut data = self.inner.data.write().unwrap_or_else(PoisonError::into_inner);
        *data = data.patched(patch);
        self.inner.patches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_reach_end_step(&self, _step: &str) -> Result<()> {
        if let Some(topology) = &self.inner.topology {
            self.prune(topology.steps());
        }
        Ok(())
    }

    async fn on_leave_end_step(&self, _step: &str) -> Result<()> {
        if let Some(topology) = &self.inner.topology {
            self.prune(topology.end_steps());
        }
        Ok(())
    }
}
