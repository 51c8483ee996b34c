//! The event record appended to, and read back from, the log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// One immutable fact in an aggregate's stream.
///
/// Callers populate everything except `id` and `sequence`; the store writes
/// `id`, `sequence`, `previous_sequence` and `creation_date` back on a
/// successful push.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Row identifier, assigned by the store.
    pub id: Option<Uuid>,
    /// Position in the aggregate stream, assigned by the store. Zero until
    /// pushed.
    pub sequence: u64,
    /// The sequence the caller believes is current for the aggregate. Zero
    /// means the stream has no events yet.
    pub previous_sequence: u64,
    /// Index of an earlier event in the same push batch whose assigned
    /// sequence replaces `previous_sequence`.
    pub previous_event: Option<usize>,
    /// Whether the optimistic-concurrency check is enforced for this event.
    pub check_previous_sequence: bool,
    /// Event type tag.
    pub event_type: String,
    /// Type of the aggregate owning the stream.
    pub aggregate_type: String,
    /// Identifier of the aggregate owning the stream.
    pub aggregate_id: String,
    /// Aggregate schema version.
    pub version: String,
    /// Creation time. The store assigns the current time when absent.
    pub creation_date: Option<DateTime<Utc>>,
    /// Opaque JSON payload.
    pub data: Option<serde_json::Value>,
    /// User that caused the event.
    pub editor_user: String,
    /// Service that caused the event.
    pub editor_service: String,
    /// Tenant owning the event.
    pub resource_owner: String,
}

impl Event {
    /// Creates an event for the given aggregate stream with empty provenance.
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    /// Returns `true` if both events belong to the same aggregate stream.
    #[must_use]
    pub fn same_aggregate(&self, other: &Event) -> bool {
        self.aggregate_type == other.aggregate_type && self.aggregate_id == other.aggregate_id
    }
}

/// Resolves the previous sequence the concurrency check compares against for
/// `batch[index]`.
///
/// A linked event must precede the event referencing it and belong to the
/// same aggregate; its already-assigned sequence wins over the event's own
/// `previous_sequence`.
///
/// # Errors
///
/// Returns `StoreError::PreconditionFailed` if the link points forward, at
/// itself, outside the batch, or at another aggregate.
pub fn resolve_previous_sequence(batch: &[Event], index: usize) -> Result<u64, StoreError> {
    let event = &batch[index];
    let Some(linked) = event.previous_event else {
        return Ok(event.previous_sequence);
    };
    if linked >= index {
        return Err(StoreError::precondition_failed(
            "APPEND-LINK-ORDER",
            format!("event {index} links to event {linked}, which does not precede it"),
        ));
    }
    let previous = &batch[linked];
    if !previous.same_aggregate(event) {
        return Err(StoreError::precondition_failed(
            "APPEND-LINK-AGGREGATE",
            "aggregate of linked events unequal",
        ));
    }
    Ok(previous.sequence)
}
