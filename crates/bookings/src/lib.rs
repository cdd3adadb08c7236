//! `gatepass-bookings` — bookings and their payment transactions.
//!
//! A `Booking` is a guest's claim on one unit of a ticket type. Every
//! booking exclusively owns one `PaymentTransaction` recording the
//! financial split between the platform and the host.

pub mod booking;
pub mod fees;
pub mod transaction;

pub use booking::{
    Booking, BookingCommand, BookingEvent, BookingId, BookingStatus, BookerContact, RefundStatus,
    RequestBooking, check_in_code_for,
};
pub use fees::{DEFAULT_PLATFORM_FEE_BPS, FeePolicy, FeeSplit};
pub use transaction::{
    ConfirmPayment, PaymentTransaction, RecordPayment, TransactionCommand, TransactionEvent,
    TransactionId, TransactionStatus,
};
