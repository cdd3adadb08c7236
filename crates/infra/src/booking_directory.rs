//! Enriched booking listings (mine / host / all).
//!
//! Read side of the booking surface: composes the booking ledger with the
//! event directory and ticket availability read models. Full scans with no
//! paging; the `Vec` seam is where a pagination contract would slot in.

use std::sync::Arc;

use gatepass_bookings::BookingId;
use gatepass_catalog::{EventId, TicketTypeId};
use gatepass_core::UserId;

use crate::projections::{
    BookingLedgerProjection, BookingRecord, EventDirectoryProjection, EventSummary,
    TicketAvailabilityProjection, TicketTypeSummary,
};
use crate::read_model::ReadModelStore;

/// A booking joined with projected summaries of its event and ticket type.
///
/// Summaries are `Option` because projections converge asynchronously; a
/// just-created booking can momentarily precede its event summary.
#[derive(Debug, Clone)]
pub struct EnrichedBooking {
    pub booking: BookingRecord,
    pub event: Option<EventSummary>,
    pub ticket_type: Option<TicketTypeSummary>,
}

/// Query façade over the booking read models.
pub struct BookingDirectory<ES, TS, BS>
where
    ES: ReadModelStore<EventId, EventSummary>,
    TS: ReadModelStore<TicketTypeId, TicketTypeSummary>,
    BS: ReadModelStore<BookingId, BookingRecord>,
{
    events: Arc<EventDirectoryProjection<ES>>,
    tickets: Arc<TicketAvailabilityProjection<TS>>,
    bookings: Arc<BookingLedgerProjection<BS>>,
}

impl<ES, TS, BS> BookingDirectory<ES, TS, BS>
where
    ES: ReadModelStore<EventId, EventSummary>,
    TS: ReadModelStore<TicketTypeId, TicketTypeSummary>,
    BS: ReadModelStore<BookingId, BookingRecord>,
{
    pub fn new(
        events: Arc<EventDirectoryProjection<ES>>,
        tickets: Arc<TicketAvailabilityProjection<TS>>,
        bookings: Arc<BookingLedgerProjection<BS>>,
    ) -> Self {
        Self {
            events,
            tickets,
            bookings,
        }
    }

    /// A guest's own bookings.
    pub fn list_for_user(&self, user_id: UserId) -> Vec<EnrichedBooking> {
        self.enrich(self.bookings.list_for_user(user_id))
    }

    /// Bookings across every event owned by the host, and nothing else.
    pub fn list_for_host(&self, host_id: UserId) -> Vec<EnrichedBooking> {
        let scope = self.events.host_event_ids(host_id);
        self.enrich(self.bookings.list_for_events(&scope))
    }

    /// Every booking in the system (privileged).
    pub fn list_all(&self) -> Vec<EnrichedBooking> {
        self.enrich(self.bookings.list_all())
    }

    fn enrich(&self, records: Vec<BookingRecord>) -> Vec<EnrichedBooking> {
        let mut out: Vec<EnrichedBooking> = records
            .into_iter()
            .map(|booking| EnrichedBooking {
                event: self.events.get(&booking.event_id),
                ticket_type: self.tickets.get(&booking.ticket_type_id),
                booking,
            })
            .collect();

        // Newest first; booking ids are time-ordered (UUIDv7).
        out.sort_by_key(|e| std::cmp::Reverse(*e.booking.booking_id.0.as_uuid()));
        out
    }
}
