//! Annals Event Store — PostgreSQL backend.
//!
//! Appends events with a single conditional insert per event inside one
//! transaction, and answers filter and max-sequence queries built from the
//! neutral `SearchQuery` model.

pub mod config;
pub mod dialect;
pub mod error;
pub mod pg_event_repository;
pub mod placeholder;
pub mod push;
pub mod query;
pub mod schema;
