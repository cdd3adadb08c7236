use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatepass_catalog::{EventId, TicketTypeId};
use gatepass_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use gatepass_messaging::DomainEvent;

/// Booking identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub AggregateId);

impl BookingId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BookingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Booking lifecycle. Only `requested` is ever produced by this core;
/// the remaining states exist for moderation/check-in flows layered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Approved,
    Rejected,
    Canceled,
    CheckedIn,
}

/// Refund progress for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    #[default]
    None,
    Requested,
    Refunded,
    Failed,
}

/// Contact details of the booker, snapshotted from the caller's claims at
/// request time. Identity is an external collaborator; the snapshot lets
/// host/admin listings show who booked without a user store here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BookerContact {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Derive the check-in code for a booking.
///
/// Uses the random tail of the booking's UUIDv7 (the leading bits are a
/// timestamp shared by same-millisecond bookings), so the code is unique per
/// booking and stable across retries of the same booking.
pub fn check_in_code_for(id: &BookingId) -> String {
    let simple = id.0.as_uuid().simple().to_string();
    format!("CHK-{}", simple[20..].to_uppercase())
}

/// Aggregate root: Booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    id: BookingId,
    event_id: Option<EventId>,
    user_id: Option<UserId>,
    ticket_type_id: Option<TicketTypeId>,
    /// Price charged at creation, in the smallest currency unit. Immune to
    /// later ticket price changes.
    price_paid: u64,
    check_in_code: Option<String>,
    payment_provider_ref: Option<String>,
    booker: BookerContact,
    status: BookingStatus,
    refund_status: RefundStatus,
    version: u64,
    created: bool,
}

impl Booking {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: BookingId) -> Self {
        Self {
            id,
            event_id: None,
            user_id: None,
            ticket_type_id: None,
            price_paid: 0,
            check_in_code: None,
            payment_provider_ref: None,
            booker: BookerContact::default(),
            status: BookingStatus::Requested,
            refund_status: RefundStatus::None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BookingId {
        self.id
    }

    pub fn event_id(&self) -> Option<EventId> {
        self.event_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn ticket_type_id(&self) -> Option<TicketTypeId> {
        self.ticket_type_id
    }

    pub fn price_paid(&self) -> u64 {
        self.price_paid
    }

    pub fn check_in_code(&self) -> Option<&str> {
        self.check_in_code.as_deref()
    }

    pub fn payment_provider_ref(&self) -> Option<&str> {
        self.payment_provider_ref.as_deref()
    }

    pub fn booker(&self) -> &BookerContact {
        &self.booker
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn refund_status(&self) -> RefundStatus {
        self.refund_status
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Booking {
    type Id = BookingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RequestBooking.
///
/// Created only by the booking engine after it has validated the event and
/// ticket type and derived the price server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBooking {
    pub booking_id: BookingId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub ticket_type_id: TicketTypeId,
    pub price_paid: u64,
    pub check_in_code: String,
    pub payment_provider_ref: Option<String>,
    pub booker: BookerContact,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingCommand {
    RequestBooking(RequestBooking),
}

/// Event: BookingRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequested {
    pub booking_id: BookingId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub ticket_type_id: TicketTypeId,
    pub price_paid: u64,
    pub check_in_code: String,
    pub payment_provider_ref: Option<String>,
    pub booker: BookerContact,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEvent {
    BookingRequested(BookingRequested),
}

impl DomainEvent for BookingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingRequested(_) => "bookings.booking.requested",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BookingEvent::BookingRequested(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Booking {
    type Command = BookingCommand;
    type Event = BookingEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BookingEvent::BookingRequested(e) => {
                self.id = e.booking_id;
                self.event_id = Some(e.event_id);
                self.user_id = Some(e.user_id);
                self.ticket_type_id = Some(e.ticket_type_id);
                self.price_paid = e.price_paid;
                self.check_in_code = Some(e.check_in_code.clone());
                self.payment_provider_ref = e.payment_provider_ref.clone();
                self.booker = e.booker.clone();
                self.status = BookingStatus::Requested;
                self.refund_status = RefundStatus::None;
                self.created = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BookingCommand::RequestBooking(cmd) => self.handle_request(cmd),
        }
    }
}

impl Booking {
    fn handle_request(&self, cmd: &RequestBooking) -> Result<Vec<BookingEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("booking already exists"));
        }
        if cmd.check_in_code.trim().is_empty() {
            return Err(DomainError::validation("check_in_code cannot be empty"));
        }

        Ok(vec![BookingEvent::BookingRequested(BookingRequested {
            booking_id: cmd.booking_id,
            event_id: cmd.event_id,
            user_id: cmd.user_id,
            ticket_type_id: cmd.ticket_type_id,
            price_paid: cmd.price_paid,
            check_in_code: cmd.check_in_code.clone(),
            payment_provider_ref: cmd.payment_provider_ref.clone(),
            booker: cmd.booker.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
