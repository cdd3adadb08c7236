//! `gatepass-infra` — infrastructure composition for the booking platform.
//!
//! Event store, command dispatcher, the booking transaction engine, the
//! payment provider boundary, and the projection/read-model machinery.

pub mod booking_directory;
pub mod booking_flow;
pub mod command_dispatcher;
pub mod event_store;
pub mod payments;
pub mod projections;
pub mod read_model;

pub use booking_directory::{BookingDirectory, EnrichedBooking};
pub use booking_flow::{
    BookingFlow, BookingFlowError, BookingReceipt, CreateBooking, TransactionReceipt,
};
pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use payments::{MockPaymentProvider, PaymentProvider, PaymentProviderError};
