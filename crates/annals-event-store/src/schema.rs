//! Event store database schema.
//!
//! The DDL lives in the workspace `migrations/` directory; these are the names
//! the queries are written against.

/// Fully qualified events table.
pub const EVENTS_TABLE: &str = "eventstore.events";

/// Per-aggregate sequence column.
pub const SEQUENCE_COLUMN: &str = "event_sequence";

/// Columns read back for every event row, in projection order.
pub const EVENT_COLUMNS: [&str; 12] = [
    "id",
    "creation_date",
    "event_type",
    "event_sequence",
    "previous_sequence",
    "event_data",
    "editor_service",
    "editor_user",
    "resource_owner",
    "aggregate_type",
    "aggregate_id",
    "aggregate_version",
];
