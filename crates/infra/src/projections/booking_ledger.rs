use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use gatepass_bookings::{BookerContact, BookingEvent, BookingId, BookingStatus, RefundStatus};
use gatepass_catalog::{EventId, TicketTypeId};
use gatepass_core::UserId;
use gatepass_messaging::EventEnvelope;

use super::{CursorCheck, Cursors, ProjectionError};
use crate::read_model::ReadModelStore;

/// Queryable booking ledger: one row per booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRecord {
    pub booking_id: BookingId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub ticket_type_id: TicketTypeId,
    pub price_paid: u64,
    pub check_in_code: String,
    pub payment_provider_ref: Option<String>,
    pub booker: BookerContact,
    pub status: BookingStatus,
    pub refund_status: RefundStatus,
    pub requested_at: DateTime<Utc>,
}

/// Booking ledger projection.
#[derive(Debug)]
pub struct BookingLedgerProjection<S>
where
    S: ReadModelStore<BookingId, BookingRecord>,
{
    store: S,
    cursors: Cursors,
}

impl<S> BookingLedgerProjection<S>
where
    S: ReadModelStore<BookingId, BookingRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::default(),
        }
    }

    pub fn get(&self, booking_id: &BookingId) -> Option<BookingRecord> {
        self.store.get(booking_id)
    }

    /// All bookings in the system (privileged; full scan, no paging).
    pub fn list_all(&self) -> Vec<BookingRecord> {
        self.store.list()
    }

    pub fn list_for_user(&self, user_id: UserId) -> Vec<BookingRecord> {
        self.store
            .list()
            .into_iter()
            .filter(|b| b.user_id == user_id)
            .collect()
    }

    /// Bookings whose event is in the given set (host-listing scope).
    pub fn list_for_events(&self, event_ids: &HashSet<EventId>) -> Vec<BookingRecord> {
        self.store
            .list()
            .into_iter()
            .filter(|b| event_ids.contains(&b.event_id))
            .collect()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let CursorCheck::Skip = self.cursors.check(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: BookingEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match ev {
            BookingEvent::BookingRequested(e) => {
                if e.booking_id.0 != aggregate_id {
                    return Err(ProjectionError::StreamMismatch(
                        "booking_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.store.upsert(
                    e.booking_id,
                    BookingRecord {
                        booking_id: e.booking_id,
                        event_id: e.event_id,
                        user_id: e.user_id,
                        ticket_type_id: e.ticket_type_id,
                        price_paid: e.price_paid,
                        check_in_code: e.check_in_code,
                        payment_provider_ref: e.payment_provider_ref,
                        booker: e.booker,
                        status: BookingStatus::Requested,
                        refund_status: RefundStatus::None,
                        requested_at: e.occurred_at,
                    },
                );
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gatepass_bookings::booking::BookingRequested;
    use gatepass_core::AggregateId;
    use uuid::Uuid;

    use crate::read_model::InMemoryReadModelStore;

    type Projection = BookingLedgerProjection<Arc<InMemoryReadModelStore<BookingId, BookingRecord>>>;

    fn projection() -> Projection {
        BookingLedgerProjection::new(Arc::new(InMemoryReadModelStore::new()))
    }

    fn requested(booking_id: BookingId, user_id: UserId, event_id: EventId) -> BookingEvent {
        BookingEvent::BookingRequested(BookingRequested {
            booking_id,
            event_id,
            user_id,
            ticket_type_id: TicketTypeId::new(AggregateId::new()),
            price_paid: 1_000,
            check_in_code: "CHK-TEST".to_string(),
            payment_provider_ref: Some("mock_deadbeef".to_string()),
            booker: BookerContact::default(),
            occurred_at: Utc::now(),
        })
    }

    fn envelope(booking_id: BookingId, ev: &BookingEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            booking_id.0,
            "bookings.booking",
            1,
            serde_json::to_value(ev).unwrap(),
        )
    }

    #[test]
    fn user_listing_only_returns_own_bookings() {
        let projection = projection();
        let me = UserId::new();
        let event_id = EventId::new(AggregateId::new());

        let mine = BookingId::new(AggregateId::new());
        let theirs = BookingId::new(AggregateId::new());
        projection
            .apply_envelope(&envelope(mine, &requested(mine, me, event_id)))
            .unwrap();
        projection
            .apply_envelope(&envelope(theirs, &requested(theirs, UserId::new(), event_id)))
            .unwrap();

        let listed = projection.list_for_user(me);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].booking_id, mine);
        assert_eq!(projection.list_all().len(), 2);
    }

    #[test]
    fn event_scope_filters_bookings() {
        let projection = projection();
        let in_scope = EventId::new(AggregateId::new());
        let out_of_scope = EventId::new(AggregateId::new());

        let a = BookingId::new(AggregateId::new());
        let b = BookingId::new(AggregateId::new());
        projection
            .apply_envelope(&envelope(a, &requested(a, UserId::new(), in_scope)))
            .unwrap();
        projection
            .apply_envelope(&envelope(b, &requested(b, UserId::new(), out_of_scope)))
            .unwrap();

        let scope: HashSet<EventId> = [in_scope].into_iter().collect();
        let listed = projection.list_for_events(&scope);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].booking_id, a);
    }
}
