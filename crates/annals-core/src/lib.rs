//! Annals Core — event model and store contract.
//!
//! This crate defines the event record, the search query model, the error
//! taxonomy and the `EventRepository` trait every backend implements. It
//! contains no infrastructure code.

pub mod error;
pub mod event;
pub mod repository;
pub mod search;
