//! Event repository abstraction.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::event::Event;
use crate::search::SearchQuery;

/// The operations a caller needs from the event log.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Appends all `events` atomically: either every event is stored, or none.
    ///
    /// On success each event carries its assigned `id`, `sequence`,
    /// `previous_sequence` and `creation_date`. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::PreconditionFailed` if an optimistic-concurrency
    /// check fails or linked events target different aggregates, and
    /// `StoreError::Internal` on backend failure.
    async fn push(&self, events: &mut [Event]) -> Result<(), StoreError>;

    /// Returns all events matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` if the query cannot be
    /// translated, and `StoreError::Internal` on backend failure.
    async fn filter(&self, query: &SearchQuery) -> Result<Vec<Event>, StoreError>;

    /// Returns the highest sequence matching `query`, or zero if nothing
    /// matches.
    ///
    /// # Errors
    ///
    /// Same as [`EventRepository::filter`].
    async fn latest_sequence(&self, query: &SearchQuery) -> Result<u64, StoreError>;

    /// Single round-trip liveness check.
    async fn health(&self) -> Result<(), StoreError>;
}
