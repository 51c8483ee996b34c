//! Translates a `SearchQuery` into SQL, bound values and a row decoder.

use annals_core::error::StoreError;
use annals_core::event::Event;
use annals_core::search::{Columns, FilterValue, SearchQuery};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};
use uuid::Uuid;

use crate::dialect::Dialect;
use crate::schema::SEQUENCE_COLUMN;

/// A value bound to one positional marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    /// `TEXT`
    Text(String),
    /// `BIGINT`
    BigInt(i64),
    /// `TEXT[]`
    TextArray(Vec<String>),
    /// `BIGINT[]`
    BigIntArray(Vec<i64>),
}

impl BindValue {
    fn from_filter(value: &FilterValue) -> Result<Self, StoreError> {
        Ok(match value {
            FilterValue::Text(text) => BindValue::Text(text.clone()),
            FilterValue::Sequence(seq) => BindValue::BigInt(to_i64(*seq)?),
            FilterValue::TextList(texts) => BindValue::TextArray(texts.clone()),
            FilterValue::SequenceList(seqs) => BindValue::BigIntArray(
                seqs.iter()
                    .map(|seq| to_i64(*seq))
                    .collect::<Result<Vec<_>, StoreError>>()?,
            ),
        })
    }

    /// Binds this value as the next parameter of `query`.
    pub fn bind<'q>(
        self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            BindValue::Text(value) => query.bind(value),
            BindValue::BigInt(value) => query.bind(value),
            BindValue::TextArray(values) => query.bind(values),
            BindValue::BigIntArray(values) => query.bind(values),
        }
    }
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| {
        StoreError::invalid_argument("QUERY-VALUE-RANGE", format!("{value} exceeds BIGINT"))
    })
}

/// Decoding strategy bound to the query intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDecoder {
    /// One full event per row.
    Events,
    /// A single nullable `MAX` value.
    MaxSequence,
}

/// Result of decoding a row set.
#[derive(Debug)]
pub enum Decoded {
    /// Events in result-set order.
    Events(Vec<Event>),
    /// Highest sequence, zero when nothing matched.
    MaxSequence(u64),
}

impl RowDecoder {
    /// Decodes `rows` according to the strategy.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Internal` if a column is missing, has an
    /// unexpected type, or holds a negative sequence.
    pub fn decode(self, rows: &[PgRow]) -> Result<Decoded, StoreError> {
        match self {
            RowDecoder::Events => rows
                .iter()
                .map(decode_event)
                .collect::<Result<Vec<_>, _>>()
                .map(Decoded::Events),
            RowDecoder::MaxSequence => {
                let max = match rows.first() {
                    Some(row) => row
                        .try_get::<Option<i64>, _>(0)
                        .map_err(decode_error)?
                        .map(to_sequence)
                        .transpose()?,
                    None => None,
                };
                Ok(Decoded::MaxSequence(max.unwrap_or(0)))
            }
        }
    }
}

fn decode_event(row: &PgRow) -> Result<Event, StoreError> {
    let previous_sequence: Option<i64> = row.try_get("previous_sequence").map_err(decode_error)?;
    let creation_date: DateTime<Utc> = row.try_get("creation_date").map_err(decode_error)?;
    let id: Uuid = row.try_get("id").map_err(decode_error)?;

    Ok(Event {
        id: Some(id),
        sequence: to_sequence(row.try_get("event_sequence").map_err(decode_error)?)?,
        previous_sequence: previous_sequence.map(to_sequence).transpose()?.unwrap_or(0),
        previous_event: None,
        check_previous_sequence: previous_sequence.is_some(),
        event_type: row.try_get("event_type").map_err(decode_error)?,
        aggregate_type: row.try_get("aggregate_type").map_err(decode_error)?,
        aggregate_id: row.try_get("aggregate_id").map_err(decode_error)?,
        version: row.try_get("aggregate_version").map_err(decode_error)?,
        creation_date: Some(creation_date),
        data: row.try_get("event_data").map_err(decode_error)?,
        editor_user: row.try_get("editor_user").map_err(decode_error)?,
        editor_service: row.try_get("editor_service").map_err(decode_error)?,
        resource_owner: row.try_get("resource_owner").map_err(decode_error)?,
    })
}

pub(crate) fn to_sequence(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|e| {
        StoreError::internal("QUERY-DECODE", format!("negative sequence {value}"), e)
    })
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::internal("QUERY-DECODE", "unable to decode event row", err)
}

/// A translated query: neutral SQL, its bound values in marker order, and the
/// decoder matching the query intent.
#[derive(Debug)]
pub struct QueryPlan {
    /// SQL using neutral `?` markers.
    pub sql: String,
    /// One value per marker, left to right.
    pub values: Vec<BindValue>,
    /// How to decode the result rows.
    pub decoder: RowDecoder,
}

/// Builds the plan for `query`.
///
/// Conditions are AND-joined in the order they were supplied. For the events
/// intent the rows are ordered by sequence and optionally limited.
///
/// # Errors
///
/// Returns `StoreError::InvalidArgument` if a filter's value does not fit its
/// field or operation, or a sequence exceeds the `BIGINT` range.
pub fn build_query(dialect: &dyn Dialect, query: &SearchQuery) -> Result<QueryPlan, StoreError> {
    query.validate()?;

    let (mut sql, decoder) = match query.columns {
        Columns::Events => (dialect.event_query(), RowDecoder::Events),
        Columns::MaxSequence => (dialect.max_sequence_query(), RowDecoder::MaxSequence),
    };

    let mut values = Vec::with_capacity(query.filters.len() + 1);
    let mut conditions = Vec::with_capacity(query.filters.len());
    for filter in &query.filters {
        conditions.push(dialect.condition(filter.field, filter.operation));
        values.push(BindValue::from_filter(&filter.value)?);
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    if decoder == RowDecoder::Events {
        sql.push_str(" ORDER BY ");
        sql.push_str(SEQUENCE_COLUMN);
        if query.desc {
            sql.push_str(" DESC");
        }
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(BindValue::BigInt(to_i64(limit)?));
        }
    }

    Ok(QueryPlan {
        sql,
        values,
        decoder,
    })
}
