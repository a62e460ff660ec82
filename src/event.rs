//! Wizard events.
//!
//! This module provides [`WizardEvent`] for observing a wizard instance.
//! Events are broadcast through a channel that can be subscribed to for
//! analytics, logging, or driving step animations.

use crate::Topology;

/// The direction of a step change, by declared step order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transition {
    /// Moved to a later step, or stayed in place.
    #[default]
    Forward,
    /// Moved to an earlier step.
    Backward,
}

impl Transition {
    /// Computes the direction of a move from `from` to `to`.
    ///
    /// Unknown steps count as position zero, so a first observation is
    /// always forward.
    pub fn between(from: Option<&str>, to: &str, topology: &Topology) -> Self {
        let position = |step: Option<&str>| step.and_then(|s| topology.index_of(s)).unwrap_or(0);
        if position(Some(to)) < position(from) {
            Self::Backward
        } else {
            Self::Forward
        }
    }
}

/// An event emitted by a wizard instance.
///
/// Events use `String` for identifiers to keep the event type simple
/// and easy to serialize for logging or transmission.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum WizardEvent {
    /// The resolved current step changed.
    StepChanged {
        /// The wizard instance identifier.
        wizard_id: String,
        /// The previously resolved step, if any.
        from: Option<String>,
        /// The newly resolved step.
        to: String,
        /// The direction of the move.
        transition: Transition,
    },

    /// The address asked for a step that could not be shown, and was
    /// rewritten to the resolved step.
    Redirected {
        /// The wizard instance identifier.
        wizard_id: String,
        /// The raw marker found in the address.
        requested: String,
        /// The step shown instead.
        resolved: String,
    },

    /// An end step was entered through a push.
    EndStepReached {
        /// The wizard instance identifier.
        wizard_id: String,
        /// The end step.
        step: String,
    },

    /// The flow went from an end step back to an ordinary step.
    EndStepLeft {
        /// The wizard instance identifier.
        wizard_id: String,
        /// The end step that was left.
        step: String,
    },

    /// Draft data was patched.
    DraftPatched {
        /// The wizard instance identifier.
        wizard_id: String,
        /// The steps touched by the patch.
        steps: Vec<String>,
    },

    /// The wizard was unmounted.
    Unmounted {
        /// The wizard instance identifier.
        wizard_id: String,
    },
}

impl WizardEvent {
    /// Returns the wizard instance ID for this event.
    pub fn wizard_id(&self) -> &str {
        match self {
            Self::StepChanged { wizard_id, .. }
            | Self::Redirected { wizard_id, .. }
            | Self::EndStepReached { wizard_id, .. }
            | Self::EndStepLeft { wizard_id, .. }
            | Self::DraftPatched { wizard_id, .. }
            | Self::Unmounted { wizard_id } => wizard_id,
        }
    }

    /// Returns the step this event is about, if applicable.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepChanged { to, .. } => Some(to),
            Self::Redirected { resolved, .. } => Some(resolved),
            Self::EndStepReached { step, .. } | Self::EndStepLeft { step, .. } => Some(step),
            Self::DraftPatched { .. } | Self::Unmounted { .. } => None,
        }
    }

    /// Returns true if this event concerns an end step.
    pub fn is_end_step_event(&self) -> bool {
        matches!(self, Self::EndStepReached { .. } | Self::EndStepLeft { .. })
    }
}
