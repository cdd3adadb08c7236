//! `gatepass-catalog` — events and their ticket types.
//!
//! An `Event` here is a *show*: something a host runs and guests book
//! tickets for. `TicketType` is a priced admission category with its own
//! inventory pool; it is the sole owner of its availability counters.

pub mod event;
pub mod ticket_type;

pub use event::{
    ApproveEvent, Event, EventCommand, EventId, EventLifecycleEvent, EventStatus, RejectEvent,
    SubmitEvent,
};
pub use ticket_type::{
    CreateTicketType, RefundPolicy, ReleaseUnit, ReserveUnit, TicketType, TicketTypeCommand,
    TicketTypeEvent, TicketTypeId,
};
