//! Shared test doubles for the Annals event store.

mod repository;

pub use repository::{FailingEventRepository, InMemoryEventRepository};
