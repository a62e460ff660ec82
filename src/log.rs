//! Per-instance diagnostics.
//!
//! Every wizard carries a [`WizardLog`]: a `tracing` span tagged with the
//! wizard and instance ids, plus a flag saying whether verbose step
//! diagnostics are on. The flag comes from [`MountOptions::debug`] or from
//! a `debug` parameter in the address query, so a single page can be
//! debugged without touching the others.
//!
//! [`MountOptions::debug`]: crate::MountOptions::debug

use tracing::Span;

use crate::address::Query;

/// The query parameter that turns diagnostics on.
pub const DEBUG_QUERY_KEY: &str = "debug";

/// Diagnostics handle for one wizard instance.
#[derive(Debug, Clone)]
pub struct WizardLog {
    span: Span,
    enabled: bool,
}

impl WizardLog {
    /// Creates the log for a wizard instance.
    pub fn new(wizard_id: &str, instance_id: &str, debug: bool, query: &Query) -> Self {
        let span = tracing::info_span!("wizard", wizard = %wizard_id, instance = %instance_id);
        Self {
            span,
            enabled: debug || query.contains_key(DEBUG_QUERY_KEY),
        }
    }

    /// Returns the instance span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Returns true if verbose diagnostics are on.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Emits a step diagnostic if diagnostics are on.
    pub fn step(&self, message: &str, step: &str) {
        if self.enabled {
            self.span.in_scope(|| tracing::info!(step = %step, "{}", message));
        }
    }
}

/// Installs a `tracing` subscriber filtered by `RUST_LOG`, defaulting to
/// `stepwise=info`.
///
/// Intended for binaries and tests. Does nothing if a global subscriber is
/// already set.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepwise=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
