//! Step resolution.
//!
//! Given the step the address asks for, the current drafts, and the step
//! resolved last time, decide which step the wizard is actually on. The
//! resolver never fails: anything inconsistent degrades to the start step.

use crate::address::Query;
use crate::{DraftData, Topology};

/// Extracts the requested step from a query.
///
/// Returns `None` when the marker is absent or names a step the topology
/// does not declare.
pub fn requested_step<'q>(query: &'q Query, topology: &Topology) -> Option<&'q str> {
    query
        .get(topology.step_query_key())
        .map(String::as_str)
        .filter(|step| topology.contains(step))
}

/// Derives the authoritative current step.
///
/// - No request, a request for `start`, or an unknown step resolves to
///   `start`.
/// - An end step resolves to itself only if its data passes its schema.
///   Otherwise it falls back to `previous`, or `start` when there is none.
///   End steps without a schema are always reachable.
/// - In a branching flow an ordinary step resolves to itself. In a linear
///   flow every earlier ordinary step with a schema must hold valid data,
///   or the result is `start`.
///
/// The function is pure: the same inputs always give the same step.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use stepwise::{resolve_current_step, DraftData, JsonSchema, Topology};
///
/// let topology = Topology::builder("signup")
///     .steps(["one", "two", "three"])
///     .schema("one", JsonSchema::compile(json!({"type": "object", "required": ["name"]}))?)
///     .linear(true)
///     .build()?;
///
/// let empty = DraftData::new();
/// assert_eq!(resolve_current_step(Some("three"), "one", &empty, None, &topology), "one");
///
/// let filled = DraftData::from_json(json!({"one": {"name": "bob"}}))?;
/// assert_eq!(resolve_current_step(Some("three"), "one", &filled, None, &topology), "three");
/// # Ok::<(), stepwise::WizardError>(())
/// ```
pub fn resolve_current_step(
    requested: Option<&str>,
    start: &str,
    data: &DraftData,
    previous: Option<&str>,
    topology: &Topology,
) -> String {
    let requested = match requested {
        Some(step) if step != start && topology.contains(step) => step,
        _ => return start.to_string(),
    };

    if topology.is_end_step(requested) {
        if step_is_valid(requested, data, topology) {
            return requested.to_string();
        }
        return previous.unwrap_or(start).to_string();
    }

    if !topology.is_linear() {
        return requested.to_string();
    }

    let earlier_complete = topology
        .steps()
        .iter()
        .take_while(|step| step.as_str() != requested)
        .all(|step| step_is_valid(step, data, topology));

    if earlier_complete {
        requested.to_string()
    } else {
        start.to_string()
    }
}

/// Returns true if `step` has no schema or its data passes the schema.
pub(crate) fn step_is_valid(step: &str, data: &DraftData, topology: &Topology) -> bool {
    topology
        .schema_for(step)
        .map_or(true, |schema| schema.is_valid(&data.value_for(step)))
}
