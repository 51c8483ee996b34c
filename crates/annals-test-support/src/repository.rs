//! Test repositories — `EventRepository` implementations without a database.

use std::sync::Mutex;

use annals_core::error::StoreError;
use annals_core::event::{Event, resolve_previous_sequence};
use annals_core::repository::EventRepository;
use annals_core::search::{Columns, SearchQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// An event repository that keeps the log in memory.
///
/// Pushes follow the same rules as the PostgreSQL store: batches are
/// all-or-nothing, linked events must precede their successor within the same
/// aggregate, and checked events must name the current stream sequence.
/// The whole push holds the log lock, so concurrent pushes to one stream are
/// serialized the same way the stream lock serializes them in PostgreSQL.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    created_at: Option<DateTime<Utc>>,
    log: Mutex<Vec<Event>>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository stamping missing creation dates with the
    /// current time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps every event pushed without a creation date with `created_at`.
    #[must_use]
    pub fn with_creation_date(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Returns a snapshot of every stored event in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stored_events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    fn matching(&self, query: &SearchQuery, columns: Columns) -> Result<Vec<Event>, StoreError> {
        query.validate()?;
        if query.columns != columns {
            return Err(StoreError::invalid_argument(
                "QUERY-COLUMNS",
                "query columns do not match the operation",
            ));
        }
        Ok(self
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|event| query.matches(event))
            .cloned()
            .collect())
    }
}

fn current_sequence<'a>(events: impl Iterator<Item = &'a Event>, target: &Event) -> u64 {
    events
        .filter(|event| event.same_aggregate(target))
        .map(|event| event.sequence)
        .max()
        .unwrap_or(0)
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn push(&self, events: &mut [Event]) -> Result<(), StoreError> {
        let mut log = self.log.lock().unwrap();
        let mut batch = events.to_vec();
        let mut staged: Vec<Event> = Vec::with_capacity(batch.len());

        for index in 0..batch.len() {
            let previous_sequence = resolve_previous_sequence(&batch, index)?;
            let current = current_sequence(log.iter().chain(staged.iter()), &batch[index]);

            let event = &mut batch[index];
            if event.check_previous_sequence && current != previous_sequence {
                return Err(StoreError::precondition_failed(
                    "APPEND-CONFLICT",
                    format!(
                        "{}/{} is no longer at sequence {previous_sequence}",
                        event.aggregate_type, event.aggregate_id
                    ),
                ));
            }

            event.id = Some(Uuid::new_v4());
            event.sequence = current + 1;
            event.previous_sequence = if event.check_previous_sequence {
                previous_sequence
            } else {
                0
            };
            if event.creation_date.is_none() {
                event.creation_date = Some(self.created_at.unwrap_or_else(Utc::now));
            }

            staged.push(Event {
                previous_event: None,
                ..event.clone()
            });
        }

        log.extend(staged);
        events.clone_from_slice(&batch);
        Ok(())
    }

    async fn filter(&self, query: &SearchQuery) -> Result<Vec<Event>, StoreError> {
        let mut events = self.matching(query, Columns::Events)?;
        if query.desc {
            events.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        } else {
            events.sort_by_key(|event| event.sequence);
        }
        if let Some(limit) = query.limit {
            events.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(events)
    }

    async fn latest_sequence(&self, query: &SearchQuery) -> Result<u64, StoreError> {
        Ok(self
            .matching(query, Columns::MaxSequence)?
            .iter()
            .map(|event| event.sequence)
            .max()
            .unwrap_or(0))
    }

    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// An event repository that always returns an internal error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

fn connection_refused() -> StoreError {
    StoreError::internal(
        "TEST-UNAVAILABLE",
        "connection refused",
        std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
    )
}

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn push(&self, _events: &mut [Event]) -> Result<(), StoreError> {
        Err(connection_refused())
    }

    async fn filter(&self, _query: &SearchQuery) -> Result<Vec<Event>, StoreError> {
        Err(connection_refused())
    }

    async fn latest_sequence(&self, _query: &SearchQuery) -> Result<u64, StoreError> {
        Err(connection_refused())
    }

    async fn health(&self) -> Result<(), StoreError> {
        Err(connection_refused())
    }
}
