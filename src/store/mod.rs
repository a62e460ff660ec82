//! Draft storage for wizard instances.
//!
//! Two collaborator traits live here:
//!
//! - [`SessionStorage`]: a per-session keyed slot store (the browser's
//!   `sessionStorage` in a web app). The wizard always keeps its history
//!   there, and by default its draft data too.
//! - [`DraftStore`]: the uniform interface the wizard uses for draft data:
//!   read, patch, and the end-step lifecycle hooks.
//!
//! Concrete implementations:
//!
//! - [`MemorySessionStorage`]: thread-safe in-memory session storage
//! - [`SessionDraftStore`]: the default draft store, backed by a session slot
//! - [`MemoryDraftStore`]: an in-memory custom draft store
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use stepwise::{DraftData, DraftStore, MemoryDraftStore};
//!
//! # async fn example() -> stepwise::Result<()> {
//! let store = MemoryDraftStore::new();
//! store.patch_data(&DraftData::from_json(json!({"one": {"name": "bob"}}))?).await?;
//! store.patch_data(&DraftData::from_json(json!({"one": {"age": 42}}))?).await?;
//!
//! let data = store.data()?;
//! assert_eq!(data.to_json(), json!({"one": {"name": "bob", "age": 42}}));
//! # Ok(())
//! # }
//! ```

mod memory;
mod session;

pub use memory::{MemoryDraftStore, MemorySessionStorage};
pub use session::SessionDraftStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{DraftData, Result, StorageKind, Topology, WizardError};

/// A per-session keyed slot store.
///
/// Reads return `None` for missing keys. Writes go through a functional
/// updater that receives the latest stored value (or the default), so
/// concurrent writers never overwrite each other with a stale snapshot.
///
/// # Object Safety
///
/// This trait is object-safe; wizards hold it as `Arc<dyn SessionStorage>`.
/// Typed helpers are provided on `dyn SessionStorage`.
pub trait SessionStorage: Send + Sync {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<JsonValue>>;

    /// Replaces the value under `key` with `updater(previous)`, where
    /// `previous` is the stored value or `default` if there is none.
    ///
    /// Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn update(
        &self,
        key: &str,
        default: JsonValue,
        updater: &mut dyn FnMut(JsonValue) -> JsonValue,
    ) -> Result<JsonValue>;
}

impl<'a> dyn SessionStorage + 'a {
    /// Reads and deserializes the slot under `key`, falling back to
    /// `default` if it is missing or holds something unreadable.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.get(key)? {
            Some(value) => Ok(decode_or(key, value, default)),
            None => Ok(default),
        }
    }

    /// Applies `updater` to the typed value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage fails or the value cannot be
    /// serialized.
    pub fn update_with<T, F>(&self, key: &str, default: T, updater: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce(T) -> T,
    {
        let default_json = serde_json::to_value(&default)?;
        let mut updater = Some(updater);
        let mut failure = None;
        let stored = self.update(key, default_json, &mut |previous| {
            let previous = decode_or(key, previous, default.clone());
            let next = match updater.take() {
                Some(updater) => updater(previous),
                None => previous,
            };
            match serde_json::to_value(&next) {
                Ok(value) => value,
                Err(e) => {
                    failure = Some(e);
                    JsonValue::Null
                }
            }
        })?;

        if let Some(e) = failure {
            return Err(WizardError::Serialization(e));
        }
        Ok(serde_json::from_value(stored)?)
    }
}

fn decode_or<T: DeserializeOwned>(key: &str, value: JsonValue, default: T) -> T {
    match serde_json::from_value(value) {
        Ok(decoded) => decoded,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "discarding unreadable session slot");
            default
        }
    }
}

/// The draft data interface used by a wizard instance.
///
/// Implement this trait to keep drafts somewhere other than session storage,
/// such as a remote API. Patches must merge per step and then per field
/// (see [`DraftData::merged`]); a store that persists asynchronously should
/// apply the patch against its latest value rather than a captured snapshot.
///
/// The end-step hooks default to doing nothing.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use async_trait::async_trait;
/// use stepwise::{DraftData, DraftStore};
///
/// struct RemoteDrafts {
///     data: Mutex<Arc<DraftData>>,
/// }
///
/// #[async_trait]
/// impl DraftStore for RemoteDrafts {
///     fn data(&self) -> stepwise::Result<Arc<DraftData>> {
///         Ok(self.data.lock().unwrap().clone())
///     }
///
///     async fn patch_data(&self, patch: &DraftData) -> stepwise::Result<()> {
///         // send to the server here
///         let mut data = self.data.lock().unwrap();
///         *data = data.patched(patch);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Returns the current draft data.
    ///
    /// # Errors
    ///
    /// Returns an error if the drafts cannot be read.
    fn data(&self) -> Result<Arc<DraftData>>;

    /// Merges `patch` into the stored drafts.
    ///
    /// # Errors
    ///
    /// Returns an error if the drafts cannot be written.
    async fn patch_data(&self, patch: &DraftData) -> Result<()>;

    /// Called after the wizard enters the end step `step`.
    async fn on_reach_end_step(&self, _step: &str) -> Result<()> {
        Ok(())
    }

    /// Called after the wizard leaves the end step `step` for an ordinary step.
    async fn on_leave_end_step(&self, _step: &str) -> Result<()> {
        Ok(())
    }
}

/// Picks the draft store for a new wizard instance.
///
/// The topology's [`StorageKind`] decides: session topologies get a
/// [`SessionDraftStore`] seeded with `initial`; custom topologies must be
/// handed a store.
///
/// # Errors
///
/// Returns [`WizardError::Configuration`] if the provided store does not
/// match the topology's storage kind, or if initial data is passed to a
/// custom store.
pub(crate) fn select_draft_store(
    topology: &Arc<Topology>,
    instance_id: &str,
    session: &Arc<dyn SessionStorage>,
    custom: Option<Arc<dyn DraftStore>>,
    initial: Option<DraftData>,
) -> Result<Arc<dyn DraftStore>> {
    match (topology.storage(), custom) {
        (StorageKind::Session, None) => {
            let store =
                SessionDraftStore::new(Arc::clone(topology), Arc::clone(session), instance_id);
            if let Some(initial) = initial {
                store.seed(&initial)?;
            }
            Ok(Arc::new(store))
        }
        (StorageKind::Session, Some(_)) => Err(WizardError::Configuration(format!(
            "wizard {} uses session storage but a custom draft store was provided",
            topology.id()
        ))),
        (StorageKind::Custom, Some(store)) => {
            if initial.is_some() {
                return Err(WizardError::Configuration(format!(
                    "wizard {} uses a custom draft store; \
                     seed it directly instead of passing initial data",
                    topology.id()
                )));
            }
            Ok(store)
        }
        (StorageKind::Custom, None) => Err(WizardError::Configuration(format!(
            "wizard {} requires a custom draft store",
            topology.id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topology(kind: StorageKind) -> Arc<Topology> {
        Arc::new(
            Topology::builder("testing")
                .steps(["one", "two"])
                .end(["done"])
                .storage(kind)
                .build()
                .unwrap(),
        )
    }

    fn session() -> Arc<dyn SessionStorage> {
        Arc::new(MemorySessionStorage::new())
    }

    #[test]
    fn test_typed_read_default() {
        let storage = session();
        let value: Vec<String> = storage.read("missing", vec!["x".to_string()]).unwrap();
        assert_eq!(value, vec!["x".to_string()]);
    }

    #[test]
    fn test_typed_update_with() {
        let storage = session();
        let next = storage
            .update_with("list", Vec::<String>::new(), |mut list| {
                list.push("a".to_string());
                list
            })
            .unwrap();
        assert_eq!(next, vec!["a".to_string()]);

        let read: Vec<String> = storage.read("list", Vec::new()).unwrap();
        assert_eq!(read, vec!["a".to_string()]);
    }

    #[test]
    fn test_unreadable_slot_falls_back_to_default() {
        let storage = session();
        storage
            .update("list", JsonValue::Null, &mut |_| json!({"not": "a list"}))
            .unwrap();
        let read: Vec<String> = storage.read("list", Vec::new()).unwrap();
        assert!(read.is_empty());
    }

    #[test]
    fn test_select_session_store() {
        let store =
            select_draft_store(&topology(StorageKind::Session), "1", &session(), None, None);
        assert!(store.is_ok());
    }

    #[test]
    fn test_select_session_store_seeds_initial_data() {
        let storage = session();
        let initial = DraftData::from_json(json!({"one": {"name": "seed"}})).unwrap();
        let store = select_draft_store(
            &topology(StorageKind::Session),
            "1",
            &storage,
            None,
            Some(initial),
        )
        .unwrap();
        assert_eq!(store.data().unwrap().to_json(), json!({"one": {"name": "seed"}}));
        assert!(storage.get("testing_1_data").unwrap().is_some());
    }

    #[test]
    fn test_select_custom_without_store_is_error() {
        let result =
            select_draft_store(&topology(StorageKind::Custom), "1", &session(), None, None);
        assert!(matches!(result, Err(WizardError::Configuration(_))));
    }

    #[test]
    fn test_select_custom_with_store() {
        let custom: Arc<dyn DraftStore> = Arc::new(MemoryDraftStore::new());
        let result = select_draft_store(
            &topology(StorageKind::Custom),
            "1",
            &session(),
            Some(custom),
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_select_custom_with_initial_data_is_error() {
        let custom: Arc<dyn DraftStore> = Arc::new(MemoryDraftStore::new());
        let result = select_draft_store(
            &topology(StorageKind::Custom),
            "1",
            &session(),
            Some(custom),
            Some(DraftData::new()),
        );
        assert!(matches!(result, Err(WizardError::Configuration(_))));
    }

    #[test]
    fn test_select_session_with_custom_store_is_error() {
        let custom: Arc<dyn DraftStore> = Arc::new(MemoryDraftStore::new());
        let result = select_draft_store(
            &topology(StorageKind::Session),
            "1",
            &session(),
            Some(custom),
            None,
        );
        assert!(matches!(result, Err(WizardError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_default_hooks_are_noops() {
        struct Plain;

        #[async_trait]
        impl DraftStore for Plain {
            fn data(&self) -> Result<Arc<DraftData>> {
                Ok(Arc::new(DraftData::new()))
            }

            async fn patch_data(&self, _patch: &DraftData) -> Result<()> {
                Ok(())
            }
        }

        let store = Plain;
        assert!(store.on_reach_end_step("done").await.is_ok());
        assert!(store.on_leave_end_step("done").await.is_ok());
    }
}
