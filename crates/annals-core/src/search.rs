//! Search query model: conjunctive filters over a fixed set of event fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::event::Event;

/// Event fields a filter may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// `Event::aggregate_id`.
    AggregateId,
    /// `Event::aggregate_type`.
    AggregateType,
    /// `Event::sequence`.
    Sequence,
    /// `Event::resource_owner`.
    ResourceOwner,
    /// `Event::editor_service`.
    EditorService,
    /// `Event::editor_user`.
    EditorUser,
    /// `Event::event_type`.
    EventType,
}

impl Field {
    /// All fields, in declaration order.
    pub const ALL: [Field; 7] = [
        Field::AggregateId,
        Field::AggregateType,
        Field::Sequence,
        Field::ResourceOwner,
        Field::EditorService,
        Field::EditorUser,
        Field::EventType,
    ];

    /// Client-facing name of the field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Field::AggregateId => "aggregate_id",
            Field::AggregateType => "aggregate_type",
            Field::Sequence => "sequence",
            Field::ResourceOwner => "resource_owner",
            Field::EditorService => "editor_service",
            Field::EditorUser => "editor_user",
            Field::EventType => "event_type",
        }
    }

    /// Returns `true` if the field holds a sequence number rather than text.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Field::Sequence)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| {
                StoreError::invalid_argument("QUERY-FIELD", format!("unknown field: {s}"))
            })
    }
}

/// Comparison applied by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Field equals the value.
    Equals,
    /// Field equals any value of a list.
    In,
    /// Field is greater than the value.
    Greater,
    /// Field is less than the value.
    Less,
}

impl FromStr for Operation {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(Operation::Equals),
            "in" => Ok(Operation::In),
            "greater" => Ok(Operation::Greater),
            "less" => Ok(Operation::Less),
            other => Err(StoreError::invalid_argument(
                "QUERY-OPERATION",
                format!("unknown operation: {other}"),
            )),
        }
    }
}

/// Value a filter compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterValue {
    /// A single text value.
    Text(String),
    /// A single sequence number.
    Sequence(u64),
    /// A set of text values, for [`Operation::In`].
    TextList(Vec<String>),
    /// A set of sequence numbers, for [`Operation::In`].
    SequenceList(Vec<u64>),
}

impl FilterValue {
    /// Returns `true` for the list variants.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, FilterValue::TextList(_) | FilterValue::SequenceList(_))
    }

    /// Returns `true` for the sequence variants.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, FilterValue::Sequence(_) | FilterValue::SequenceList(_))
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        FilterValue::Sequence(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        FilterValue::TextList(values)
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::TextList(values.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<u64>> for FilterValue {
    fn from(values: Vec<u64>) -> Self {
        FilterValue::SequenceList(values)
    }
}

/// A single condition of a [`SearchQuery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Field the condition applies to.
    pub field: Field,
    /// Comparison operator.
    pub operation: Operation,
    /// Right-hand side of the comparison.
    pub value: FilterValue,
}

impl Filter {
    /// Creates a filter.
    pub fn new(field: Field, operation: Operation, value: impl Into<FilterValue>) -> Self {
        Self {
            field,
            operation,
            value: value.into(),
        }
    }

    /// Checks that the value shape fits the field and operation.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` when a sequence field is compared
    /// to text (or the reverse), `In` gets a scalar, or a scalar operator gets
    /// a list.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.field.is_numeric() != self.value.is_numeric() {
            return Err(StoreError::invalid_argument(
                "QUERY-VALUE-TYPE",
                format!("value type does not match field {}", self.field),
            ));
        }
        if (self.operation == Operation::In) != self.value.is_list() {
            return Err(StoreError::invalid_argument(
                "QUERY-VALUE-SHAPE",
                format!(
                    "operation {:?} on field {} requires {}",
                    self.operation,
                    self.field,
                    if self.operation == Operation::In {
                        "a list value"
                    } else {
                        "a single value"
                    }
                ),
            ));
        }
        Ok(())
    }

    /// Evaluates the condition against an event. A filter that fails
    /// [`Filter::validate`] matches nothing.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let text = match self.field {
            Field::Sequence => {
                let actual = event.sequence;
                return match (&self.value, self.operation) {
                    (FilterValue::Sequence(v), Operation::Equals) => actual == *v,
                    (FilterValue::Sequence(v), Operation::Greater) => actual > *v,
                    (FilterValue::Sequence(v), Operation::Less) => actual < *v,
                    (FilterValue::SequenceList(vs), Operation::In) => vs.contains(&actual),
                    _ => false,
                };
            }
            Field::AggregateId => &event.aggregate_id,
            Field::AggregateType => &event.aggregate_type,
            Field::ResourceOwner => &event.resource_owner,
            Field::EditorService => &event.editor_service,
            Field::EditorUser => &event.editor_user,
            Field::EventType => &event.event_type,
        };
        match (&self.value, self.operation) {
            (FilterValue::Text(v), Operation::Equals) => text == v,
            (FilterValue::Text(v), Operation::Greater) => text > v,
            (FilterValue::Text(v), Operation::Less) => text < v,
            (FilterValue::TextList(vs), Operation::In) => vs.contains(text),
            _ => false,
        }
    }
}

/// What a search query returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Columns {
    /// Full event rows.
    #[default]
    Events,
    /// Only the highest matching sequence.
    MaxSequence,
}

/// A conjunctive filter over the event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Query intent.
    pub columns: Columns,
    /// Conditions, AND-joined in order.
    pub filters: Vec<Filter>,
    /// Return events in descending sequence order.
    pub desc: bool,
    /// Maximum number of events to return.
    pub limit: Option<u64>,
}

impl SearchQuery {
    /// Starts a query that fetches matching events.
    #[must_use]
    pub fn events() -> Self {
        Self::default()
    }

    /// Starts a query that fetches the highest matching sequence.
    #[must_use]
    pub fn max_sequence() -> Self {
        Self {
            columns: Columns::MaxSequence,
            ..Self::default()
        }
    }

    /// Adds a condition.
    #[must_use]
    pub fn filter(
        mut self,
        field: Field,
        operation: Operation,
        value: impl Into<FilterValue>,
    ) -> Self {
        self.filters.push(Filter::new(field, operation, value));
        self
    }

    /// Restricts the query to one aggregate stream.
    #[must_use]
    pub fn aggregate(self, aggregate_type: &str, aggregate_id: &str) -> Self {
        self.filter(Field::AggregateType, Operation::Equals, aggregate_type)
            .filter(Field::AggregateId, Operation::Equals, aggregate_id)
    }

    /// Orders events by descending sequence.
    #[must_use]
    pub fn descending(mut self) -> Self {
        self.desc = true;
        self
    }

    /// Caps the number of returned events.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validates every filter.
    ///
    /// # Errors
    ///
    /// Returns the first `StoreError::InvalidArgument` reported by
    /// [`Filter::validate`].
    pub fn validate(&self) -> Result<(), StoreError> {
        self.filters.iter().try_for_each(Filter::validate)
    }

    /// Returns `true` if `event` satisfies every filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.filters.iter().all(|filter| filter.matches(event))
    }
}
