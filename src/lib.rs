//! # Stepwise
//!
//! A multi-step form wizard controller: step resolution, draft persistence
//! and address synchronization for client-side flows.
//!
//! A wizard walks a user through named steps. Each step may carry a
//! validation schema; partially filled data is kept as a draft between
//! steps; and the current step lives in the page address, so back/forward
//! navigation and direct links work. Stepwise is the state machine behind
//! that, independent of any UI:
//!
//! - The current step is derived from scratch on every observation, from
//!   the requested step, the drafts, and the flow's shape. A linear flow
//!   refuses to skip ahead of incomplete steps; end steps are only shown
//!   once their data validates.
//! - Drafts are merged per step and then per field, never replaced.
//! - When the address asks for a step that cannot be shown, it is
//!   rewritten to the step that is.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use stepwise::{
//!     DraftData, JsonSchema, MemoryAddress, MemorySessionStorage, MountOptions, Topology, Wizard,
//! };
//!
//! # async fn example() -> stepwise::Result<()> {
//! let topology = Arc::new(
//!     Topology::builder("signup")
//!         .steps(["account", "profile"])
//!         .end(["welcome"])
//!         .schema(
//!             "account",
//!             JsonSchema::compile(json!({"type": "object", "required": ["email"]}))?,
//!         )
//!         .linear(true)
//!         .build()?,
//! );
//!
//! let address = MemoryAddress::new();
//! let mut wizard = Wizard::mount(
//!     topology,
//!     address.clone(),
//!     Arc::new(MemorySessionStorage::new()),
//!     MountOptions::new("main"),
//! )
//! .await?;
//!
//! // Skipping ahead is refused while "account" is incomplete.
//! address.set_param("w_signup", "profile");
//! wizard.observe().await?;
//! assert_eq!(wizard.current_step(), "account");
//!
//! wizard
//!     .push("profile", Some(DraftData::from_json(json!({"account": {"email": "a@b.c"}}))?))
//!     .await?;
//! wizard.observe().await?;
//! assert_eq!(wizard.current_step(), "profile");
//! # Ok(())
//! # }
//! ```
//!
//! ## Collaborators
//!
//! The page address, session storage, draft storage and validation are
//! traits ([`Address`], [`SessionStorage`], [`DraftStore`], [`Schema`]).
//! In-memory implementations ship with the crate, as does [`JsonSchema`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![forbid(unsafe_code)]

pub mod address;
pub mod config;
pub mod data;
pub mod error;
pub mod event;
pub mod form;
pub mod history;
pub mod log;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod topology;
pub mod wizard;

pub use address::{
    Address, LinkTarget, MemoryAddress, NavigateOptions, Navigation, NavigationKind, Query,
};
pub use config::TopologyConfig;
pub use data::{DraftData, StepRecord};
pub use error::{Result, WizardError};
pub use event::{Transition, WizardEvent};
pub use form::{FormBinding, FormOptions, SubmitHook};
pub use history::History;
pub use log::{init_tracing, WizardLog};
pub use resolver::{requested_step, resolve_current_step};
pub use schema::{FnSchema, JsonSchema, Schema, SchemaIssues};
pub use store::{
    DraftStore, MemoryDraftStore, MemorySessionStorage, SessionDraftStore, SessionStorage,
};
pub use topology::{StorageKind, StorageSlot, Topology, TopologyBuilder};
pub use wizard::{MountOptions, Wizard};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
