//! `gatepass-messaging` — event plumbing (publish/subscribe mechanics).
//!
//! Named `messaging` rather than `events` because in this codebase `Event`
//! is a business entity (a show people book tickets for).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::DomainEvent;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
