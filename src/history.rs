//! Visited-step history of a wizard instance.
//!
//! History drives the "go back" target of branching flows. It is kept in
//! the session storage slot `"{topology_id}_{instance_id}_history"`.

use crate::store::SessionStorage;
use crate::Result;
use crate::Topology;

/// The ordered steps visited since the flow last started over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    key: String,
    entries: Vec<String>,
}

impl History {
    /// Loads the history stored under `key`, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if session storage cannot be read.
    pub fn load(storage: &dyn SessionStorage, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let entries = storage.read(&key, Vec::new())?;
        Ok(Self { key, entries })
    }

    /// Returns the session storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the visited steps, oldest first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Returns the most recently visited step.
    pub fn last(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records a visit to `step`. Returns true if the history changed.
    ///
    /// A repeat of the last entry is ignored. Returning to `start` or
    /// entering an end step resets the history to empty.
    pub fn record(&mut self, step: &str, start: &str, topology: &Topology) -> bool {
        if self.last() == Some(step) {
            return false;
        }
        if step == start || topology.is_end_step(step) {
            return self.clear();
        }
        self.entries.push(step.to_string());
        true
    }

    /// Empties the history. Returns true if it held anything.
    pub fn clear(&mut self) -> bool {
        let had_entries = !self.entries.is_empty();
        self.entries.clear();
        had_entries
    }

    /// Writes the history back to session storage.
    ///
    /// # Errors
    ///
    /// Returns an error if session storage cannot be written.
    pub fn persist(&self, storage: &dyn SessionStorage) -> Result<()> {
        let entries = self.entries.clone();
        storage
            .update_with(&self.key, Vec::<String>::new(), move |_| entries)
            .map(|_| ())
    }

    /// Computes the step a "go back" action should lead to from `current`.
    ///
    /// There is no back target at `start` or at an end step. Linear flows
    /// go to the previous ordinary step. Branching flows go to the most
    /// recent visited step declared before `current`, or to `start` when
    /// there is none.
    pub fn back_target(&self, current: &str, start: &str, topology: &Topology) -> Option<String> {
        if current == start || topology.is_end_step(current) {
            return None;
        }

        if topology.is_linear() {
            return topology
                .previous_ordinary_step(current)
                .map(str::to_string);
        }

        let current_index = topology.index_of(current)?;
        let target = self
            .entries
            .iter()
            .rev()
            .find(|step| {
                topology
                    .index_of(step)
                    .is_some_and(|index| index < current_index)
            })
            .map(String::as_str)
            .unwrap_or(start);
        Some(target.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySessionStorage;
    use serde_json::json;

    fn topology(linear: bool) -> Topology {
        Topology::builder("t")
            .steps(["one", "two", "three", "four"])
            .end(["done"])
            .linear(linear)
            .build()
            .unwrap()
    }

    fn history(entries: &[&str]) -> History {
        History {
            key: "t_1_history".to_string(),
            entries: entries.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_record_appends_and_skips_repeats() {
        let t = topology(false);
        let mut h = history(&[]);
        assert!(h.record("two", "one", &t));
        assert!(!h.record("two", "one", &t));
        assert!(h.record("four", "one", &t));
        assert_eq!(h.entries(), ["two", "four"]);
    }

    #[test]
    fn test_record_resets_at_start_and_end() {
        let t = topology(false);
        let mut h = history(&["two", "three"]);
        assert!(h.record("one", "one", &t));
        assert!(h.is_empty());

        let mut h = history(&["two"]);
        assert!(h.record("done", "one", &t));
        assert!(h.is_empty());
        assert!(!h.record("done", "one", &t));
    }

    #[test]
    fn test_no_back_target_at_start_or_end() {
        let t = topology(false);
        let h = history(&["two"]);
        assert_eq!(h.back_target("one", "one", &t), None);
        assert_eq!(h.back_target("done", "one", &t), None);
    }

    #[test]
    fn test_linear_back_target_is_previous_step() {
        let t = topology(true);
        let h = history(&["four"]);
        assert_eq!(h.back_target("three", "one", &t).as_deref(), Some("two"));
        assert_eq!(h.back_target("two", "one", &t).as_deref(), Some("one"));
    }

    #[test]
    fn test_branching_back_target_uses_history() {
        let t = topology(false);
        let h = history(&["two", "four", "three"]);
        assert_eq!(h.back_target("four", "one", &t).as_deref(), Some("three"));
        assert_eq!(h.back_target("three", "one", &t).as_deref(), Some("two"));
    }

    #[test]
    fn test_branching_back_target_falls_back_to_start() {
        let t = topology(false);
        let h = history(&["four"]);
        assert_eq!(h.back_target("three", "one", &t).as_deref(), Some("one"));
    }

    #[test]
    fn test_load_and_persist() {
        let storage = MemorySessionStorage::new();
        let t = topology(false);

        let mut h = History::load(&storage, "t_1_history").unwrap();
        assert!(h.is_empty());
        h.record("two", "one", &t);
        h.persist(&storage).unwrap();
        assert_eq!(storage.get("t_1_history").unwrap(), Some(json!(["two"])));

        let reloaded = History::load(&storage, "t_1_history").unwrap();
        assert_eq!(reloaded.entries(), ["two"]);
    }
}
