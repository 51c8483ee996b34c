//! SQL dialect seam between the neutral query model and a concrete backend.

use annals_core::search::{Field, Operation};

use crate::placeholder;
use crate::schema::{EVENT_COLUMNS, EVENTS_TABLE, SEQUENCE_COLUMN};

/// Backend-specific pieces of SQL the query builder assembles.
///
/// Conditions are written with the neutral `?` marker;
/// [`Dialect::placeholder`] rewrites them into the backend's syntax.
pub trait Dialect: Send + Sync {
    /// Physical column backing `field`.
    fn column_name(&self, field: Field) -> &'static str;

    /// Comparison operator for `operation`.
    fn operator(&self, operation: Operation) -> &'static str;

    /// `SELECT` projecting full event rows, without a `WHERE` clause.
    fn event_query(&self) -> String;

    /// `SELECT` projecting the maximum sequence, without a `WHERE` clause.
    fn max_sequence_query(&self) -> String;

    /// Rewrites neutral markers into positional parameters.
    fn placeholder(&self, query: &str) -> String;

    /// Condition fragment comparing `field` against the next bound value.
    fn condition(&self, field: Field, operation: Operation) -> String {
        let column = self.column_name(field);
        let operator = self.operator(operation);
        if operation == Operation::In {
            format!("{column} {operator} ANY(?)")
        } else {
            format!("{column} {operator} ?")
        }
    }
}

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn column_name(&self, field: Field) -> &'static str {
        match field {
            Field::AggregateId => "aggregate_id",
            Field::AggregateType => "aggregate_type",
            Field::Sequence => SEQUENCE_COLUMN,
            Field::ResourceOwner => "resource_owner",
            Field::EditorService => "editor_service",
            Field::EditorUser => "editor_user",
            Field::EventType => "event_type",
        }
    }

    fn operator(&self, operation: Operation) -> &'static str {
        match operation {
            Operation::Equals | Operation::In => "=",
            Operation::Greater => ">",
            Operation::Less => "<",
        }
    }

    fn event_query(&self) -> String {
        format!("SELECT {} FROM {EVENTS_TABLE}", EVENT_COLUMNS.join(", "))
    }

    fn max_sequence_query(&self) -> String {
        format!("SELECT MAX({SEQUENCE_COLUMN}) FROM {EVENTS_TABLE}")
    }

    fn placeholder(&self, query: &str) -> String {
        placeholder::to_numbered(query)
    }
}
