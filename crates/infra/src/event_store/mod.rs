//! Append-only event store boundary.
//!
//! An infrastructure-facing abstraction for storing and loading event streams,
//! with an in-memory implementation and a Postgres one behind the `postgres`
//! feature.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
