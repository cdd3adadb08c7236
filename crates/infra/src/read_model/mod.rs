//! Read model storage abstractions (disposable, rebuildable from events).

pub mod store;

pub use store::{InMemoryReadModelStore, ReadModelStore};
