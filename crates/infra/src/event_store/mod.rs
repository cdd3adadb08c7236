//! Append-only event storage.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod r#trait;

pub use in_memory::InMemoryEventStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
