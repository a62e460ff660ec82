//! The navigable address a wizard keeps in sync.
//!
//! The wizard never owns the page address. It reads the current query
//! parameters through the [`Address`] collaborator and asks it to `replace`
//! (non-stacking) or `push` (stacking) a new query. [`MemoryAddress`] is an
//! in-memory implementation that records every navigation, for tests and
//! non-browser hosts.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::{Result, WizardError};

/// Query parameters of an address.
pub type Query = BTreeMap<String, String>;

/// Options for a single navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Update the address without a full reload or data refetch.
    pub shallow: bool,
    /// Scroll to the top after navigating.
    pub scroll: bool,
}

impl NavigateOptions {
    /// Shallow navigation that keeps the scroll position.
    pub fn shallow() -> Self {
        Self {
            shallow: true,
            scroll: false,
        }
    }
}

/// How a navigation affects the session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Replaces the current history entry.
    Replace,
    /// Adds a new history entry.
    Push,
}

/// A navigation target handed to link-rendering code, such as the
/// "go back" link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    /// The full query to navigate to.
    pub query: Query,
    /// Whether following the link replaces the current history entry.
    pub replace: bool,
    /// Whether the navigation is shallow.
    pub shallow: bool,
    /// Whether the page scrolls to the top.
    pub scroll: bool,
}

/// The page address as seen by a wizard.
///
/// # Object Safety
///
/// This trait is object-safe; wizards hold it as `Box<dyn Address>`.
#[async_trait]
pub trait Address: Send + Sync {
    /// Returns the current query parameters.
    fn query(&self) -> Query;

    /// Returns true once the address can be read and written.
    fn is_ready(&self) -> bool {
        true
    }

    /// Whether stacking navigations issued by the wizard should be shallow.
    ///
    /// Whether a step change should refetch page data depends on the host
    /// environment, so the address decides.
    fn shallow_push(&self) -> bool {
        false
    }

    /// Replaces the current history entry with `query`.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Navigation`] if the navigation fails.
    async fn replace(&self, query: Query, options: NavigateOptions) -> Result<()>;

    /// Pushes a new history entry with `query`.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Navigation`] if the navigation fails.
    async fn push(&self, query: Query, options: NavigateOptions) -> Result<()>;
}

/// A navigation performed through a [`MemoryAddress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Replace or push.
    pub kind: NavigationKind,
    /// The query navigated to.
    pub query: Query,
    /// The options passed along.
    pub options: NavigateOptions,
}

#[derive(Debug, Default)]
struct AddressState {
    /// Session history entries; the last one is current.
    entries: Vec<Query>,
    navigations: Vec<Navigation>,
    ready: bool,
    shallow_push: bool,
    fail_navigation: bool,
}

/// An in-memory [`Address`] with a session history stack.
///
/// Clones share the same state, so a test can keep a handle while the
/// wizard owns another.
///
/// # Example
///
/// ```
/// use stepwise::{Address, MemoryAddress, NavigateOptions};
///
/// # async fn example() -> stepwise::Result<()> {
/// let address = MemoryAddress::new();
/// address.set_param("tab", "profile");
///
/// let mut query = address.query();
/// query.insert("w_signup".to_string(), "two".to_string());
/// address.push(query, NavigateOptions::shallow()).await?;
///
/// assert_eq!(address.param("w_signup").as_deref(), Some("two"));
/// address.back();
/// assert_eq!(address.param("w_signup"), None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryAddress {
    state: Arc<RwLock<AddressState>>,
}

impl MemoryAddress {
    /// Creates a ready address with an empty query.
    pub fn new() -> Self {
        Self::with_query(Query::new())
    }

    /// Creates a ready address starting at `query`.
    pub fn with_query(query: Query) -> Self {
        Self {
            state: Arc::new(RwLock::new(AddressState {
                entries: vec![query],
                ready: true,
                ..AddressState::default()
            })),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&AddressState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<T>(&self, f: impl FnOnce(&mut AddressState) -> T) -> T {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the value of one query parameter.
    pub fn param(&self, key: &str) -> Option<String> {
        self.read(|state| state.entries.last().and_then(|q| q.get(key).cloned()))
    }

    /// Sets a query parameter in place, as a user editing the URL would.
    pub fn set_param(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.write(|state| {
            if let Some(current) = state.entries.last_mut() {
                current.insert(key, value);
            }
        });
    }

    /// Removes a query parameter in place.
    pub fn remove_param(&self, key: &str) {
        self.write(|state| {
            if let Some(current) = state.entries.last_mut() {
                current.remove(key);
            }
        });
    }

    /// Simulates opening a direct link: pushes `query` as a new entry
    /// without recording it as a wizard navigation.
    pub fn visit(&self, query: Query) {
        self.write(|state| state.entries.push(query));
    }

    /// Simulates the browser back button. Returns false at the first entry.
    pub fn back(&self) -> bool {
        self.write(|state| {
            if state.entries.len() > 1 {
                state.entries.pop();
                true
            } else {
                false
            }
        })
    }

    /// Marks the address ready or not ready.
    pub fn set_ready(&self, ready: bool) {
        self.write(|state| state.ready = ready);
    }

    /// Sets the [`Address::shallow_push`] policy.
    pub fn set_shallow_push(&self, shallow: bool) {
        self.write(|state| state.shallow_push = shallow);
    }

    /// Makes every following navigation fail.
    ///
    /// Useful for testing.
    pub fn fail_navigation(&self, fail: bool) {
        self.write(|state| state.fail_navigation = fail);
    }

    /// Returns every navigation performed through the [`Address`] trait.
    pub fn navigations(&self) -> Vec<Navigation> {
        self.read(|state| state.navigations.clone())
    }

    /// Returns the number of session history entries.
    pub fn history_len(&self) -> usize {
        self.read(|state| state.entries.len())
    }

    fn navigate(&self, kind: NavigationKind, query: Query, options: NavigateOptions) -> Result<()> {
        self.write(|state| {
            if state.fail_navigation {
                return Err(WizardError::Navigation("navigation aborted".to_string()));
            }
            match kind {
                NavigationKind::Replace => match state.entries.last_mut() {
                    Some(current) => *current = query.clone(),
                    None => state.entries.push(query.clone()),
                },
                NavigationKind::Push => state.entries.push(query.clone()),
            }
            state.navigations.push(Navigation {
                kind,
                query,
                options,
            });
            Ok(())
        })
    }
}

impl Default for MemoryAddress {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Address for MemoryAddress {
    fn query(&self) -> Query {
        self.read(|state| state.entries.last().cloned().unwrap_or_default())
    }

    fn is_ready(&self) -> bool {
        self.read(|state| state.ready)
    }

    fn shallow_push(&self) -> bool {
        self.read(|state| state.shallow_push)
    }

    async fn replace(&self, query: Query, options: NavigateOptions) -> Result<()> {
        self.navigate(NavigationKind::Replace, query, options)
    }

    async fn push(&self, query: Query, options: NavigateOptions) -> Result<()> {
        self.navigate(NavigationKind::Push, query, options)
    }
}
