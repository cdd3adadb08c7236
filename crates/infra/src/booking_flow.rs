//! Booking transaction engine.
//!
//! Given a user, an event and a ticket type, validates eligibility,
//! reserves one inventory unit, creates the booking and records its
//! payment transaction as one atomic unit of work. No partial result is
//! ever observable: either all three streams advance, or none do.
//!
//! The check-then-act race on `available` is closed with optimistic
//! concurrency: all decided events are committed through a single
//! [`EventStore::append_atomic`] whose ticket-stream version check fails if
//! a concurrent booking reserved the last unit first. A conflict triggers
//! re-validation against current state (bounded retry) rather than
//! blocking.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use gatepass_bookings::{
    Booking, BookingCommand, BookingId, BookingStatus, BookerContact, ConfirmPayment, FeePolicy,
    PaymentTransaction, RecordPayment, RefundStatus, RequestBooking, TransactionCommand,
    TransactionId, TransactionStatus, check_in_code_for,
};
use gatepass_catalog::{
    Event, EventId, ReleaseUnit, ReserveUnit, TicketType, TicketTypeCommand, TicketTypeId,
};
use gatepass_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ExpectedVersion, UserId};
use gatepass_messaging::{DomainEvent, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
use crate::payments::PaymentProvider;

/// Retry budget for optimistic write conflicts on the inventory stream.
const MAX_WRITE_ATTEMPTS: u32 = 3;

const TICKET_TYPE_AGGREGATE: &str = "catalog.ticket_type";
const BOOKING_AGGREGATE: &str = "bookings.booking";
const TRANSACTION_AGGREGATE: &str = "bookings.transaction";

/// Failures of the booking engine, mapped 1:1 to client-facing error kinds.
#[derive(Debug, Error)]
pub enum BookingFlowError {
    /// Ticket type missing, or it does not belong to the supplied event.
    #[error("invalid ticket type")]
    InvalidTicketType,

    /// No inventory remaining.
    #[error("tickets sold out")]
    SoldOut,

    /// Event missing or not live.
    #[error("event not live or not found")]
    EventNotBookable,

    /// Caller-supplied price disagrees with the server-held ticket price.
    #[error("price mismatch: ticket costs {expected}, request said {supplied}")]
    PriceMismatch { expected: u64, supplied: u64 },

    /// Concurrent-write contention exhausted the retry budget.
    #[error("write contention on ticket inventory, retries exhausted")]
    Conflict,

    /// The payment provider refused the payment.
    #[error("payment declined: {0}")]
    PaymentDeclined(String),

    /// The store failed after validation passed; nothing was committed.
    #[error("event store failure: {0}")]
    Persistence(#[from] EventStoreError),

    /// Stored history could not be decoded.
    #[error("failed to decode stored events: {0}")]
    Deserialize(String),

    /// Publication failed after a successful commit (at-least-once).
    #[error("publication failed after commit: {0}")]
    Publish(String),

    /// Deterministic domain refusal outside the named taxonomy.
    #[error(transparent)]
    Domain(DomainError),
}

/// Input to [`BookingFlow::create_booking`].
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub event_id: EventId,
    pub ticket_type_id: TicketTypeId,
    /// Optional caller-declared price; validated against the ticket type,
    /// never trusted.
    pub price_paid: Option<u64>,
    pub user_id: UserId,
    pub booker: BookerContact,
}

/// Transaction half of a booking receipt.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionReceipt {
    pub transaction_id: TransactionId,
    pub booking_id: BookingId,
    pub amount: u64,
    pub platform_fee: u64,
    pub payout_to_host: u64,
    pub provider_ref: Option<String>,
    pub status: TransactionStatus,
}

/// Result of a successful booking: both records, returned together.
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking_id: BookingId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub ticket_type_id: TicketTypeId,
    pub price_paid: u64,
    pub check_in_code: String,
    pub status: BookingStatus,
    pub refund_status: RefundStatus,
    pub transaction: TransactionReceipt,
}

/// The booking engine.
///
/// Reads validate against the event store directly (strong consistency),
/// not against projections.
pub struct BookingFlow<S, B> {
    store: S,
    bus: B,
    fees: FeePolicy,
    provider: Arc<dyn PaymentProvider>,
    max_attempts: u32,
}

impl<S, B> BookingFlow<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B, fees: FeePolicy, provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            store,
            bus,
            fees,
            provider,
            max_attempts: MAX_WRITE_ATTEMPTS,
        }
    }

    pub fn fees(&self) -> FeePolicy {
        self.fees
    }

    /// Create a booking with its payment transaction.
    ///
    /// Validation order (each a distinct error, no side effects):
    /// 1. ticket type exists and belongs to the supplied event
    /// 2. inventory remains
    /// 3. event exists and is live
    /// 4. caller-declared price, if any, matches the ticket price
    pub fn create_booking(&self, req: CreateBooking) -> Result<BookingReceipt, BookingFlowError> {
        for attempt in 1..=self.max_attempts {
            let ticket = self.load(req.ticket_type_id.0, |id| {
                TicketType::empty(TicketTypeId::new(id))
            })?;
            if !ticket.exists() || ticket.event_id() != Some(req.event_id) {
                return Err(BookingFlowError::InvalidTicketType);
            }
            if ticket.is_sold_out() {
                return Err(BookingFlowError::SoldOut);
            }

            let event = self.load(req.event_id.0, |id| Event::empty(EventId::new(id)))?;
            if !event.exists() || !event.is_bookable() {
                return Err(BookingFlowError::EventNotBookable);
            }

            // Price is derived server-side from the ticket type; a declared
            // price is only cross-checked.
            let price = ticket.price();
            if let Some(supplied) = req.price_paid {
                if supplied != price {
                    return Err(BookingFlowError::PriceMismatch {
                        expected: price,
                        supplied,
                    });
                }
            }

            let now = Utc::now();

            // Decide every event of the unit of work before touching the store.
            let reserve_events = ticket
                .handle(&TicketTypeCommand::ReserveUnit(ReserveUnit {
                    ticket_type_id: ticket.id_typed(),
                    occurred_at: now,
                }))
                .map_err(|e| match e {
                    DomainError::InvariantViolation(_) => BookingFlowError::SoldOut,
                    other => BookingFlowError::Domain(other),
                })?;

            let booking_id = BookingId::new(AggregateId::new());
            let provider_ref = self
                .provider
                .initiate(booking_id, price)
                .map_err(|e| BookingFlowError::PaymentDeclined(e.to_string()))?;

            let mut booking = Booking::empty(booking_id);
            let booking_events = booking
                .handle(&BookingCommand::RequestBooking(RequestBooking {
                    booking_id,
                    event_id: req.event_id,
                    user_id: req.user_id,
                    ticket_type_id: req.ticket_type_id,
                    price_paid: price,
                    check_in_code: check_in_code_for(&booking_id),
                    payment_provider_ref: Some(provider_ref.clone()),
                    booker: req.booker.clone(),
                    occurred_at: now,
                }))
                .map_err(BookingFlowError::Domain)?;
            for e in &booking_events {
                booking.apply(e);
            }

            let split = self.fees.split(price);
            let transaction_id = TransactionId::new(AggregateId::new());
            let mut txn = PaymentTransaction::empty(transaction_id);
            let mut txn_events = txn
                .handle(&TransactionCommand::RecordPayment(RecordPayment {
                    transaction_id,
                    booking_id,
                    amount: price,
                    platform_fee: split.platform_fee,
                    payout_to_host: split.payout_to_host,
                    provider_ref: provider_ref.clone(),
                    occurred_at: now,
                }))
                .map_err(BookingFlowError::Domain)?;
            for e in &txn_events {
                txn.apply(e);
            }

            // Mock gateway confirms synchronously; a real one would drive
            // this from a webhook.
            self.provider
                .confirm(&provider_ref)
                .map_err(|e| BookingFlowError::PaymentDeclined(e.to_string()))?;
            let confirm_events = txn
                .handle(&TransactionCommand::ConfirmPayment(ConfirmPayment {
                    transaction_id,
                    occurred_at: now,
                }))
                .map_err(BookingFlowError::Domain)?;
            for e in &confirm_events {
                txn.apply(e);
            }
            txn_events.extend(confirm_events);

            // Commit everything or nothing. The expected version on the
            // ticket stream is the one the validations ran against.
            let batches = vec![
                StreamAppend {
                    events: to_uncommitted(req.ticket_type_id.0, TICKET_TYPE_AGGREGATE, &reserve_events)?,
                    expected_version: ExpectedVersion::Exact(ticket.version()),
                },
                StreamAppend {
                    events: to_uncommitted(booking_id.0, BOOKING_AGGREGATE, &booking_events)?,
                    expected_version: ExpectedVersion::Exact(0),
                },
                StreamAppend {
                    events: to_uncommitted(transaction_id.0, TRANSACTION_AGGREGATE, &txn_events)?,
                    expected_version: ExpectedVersion::Exact(0),
                },
            ];

            let committed = match self.store.append_atomic(batches) {
                Ok(c) => c,
                Err(EventStoreError::Concurrency(msg)) => {
                    warn!(attempt, %msg, "inventory moved underneath us; re-validating");
                    continue;
                }
                Err(e) => return Err(BookingFlowError::Persistence(e)),
            };

            self.publish(&committed)?;

            info!(
                booking_id = %booking_id,
                transaction_id = %transaction_id,
                price,
                "booking committed"
            );

            return Ok(BookingReceipt {
                booking_id,
                event_id: req.event_id,
                user_id: req.user_id,
                ticket_type_id: req.ticket_type_id,
                price_paid: booking.price_paid(),
                check_in_code: booking.check_in_code().unwrap_or_default().to_string(),
                status: booking.status(),
                refund_status: booking.refund_status(),
                transaction: TransactionReceipt {
                    transaction_id,
                    booking_id,
                    amount: txn.amount(),
                    platform_fee: txn.platform_fee(),
                    payout_to_host: txn.payout_to_host(),
                    provider_ref: txn.provider_ref().map(str::to_string),
                    status: txn.status(),
                },
            });
        }

        Err(BookingFlowError::Conflict)
    }

    /// Compensating operation: restore one previously reserved unit.
    ///
    /// Exposed for future cancellation wiring; returns the new availability.
    pub fn release_inventory(&self, ticket_type_id: TicketTypeId) -> Result<u64, BookingFlowError> {
        for attempt in 1..=self.max_attempts {
            let ticket = self.load(ticket_type_id.0, |id| {
                TicketType::empty(TicketTypeId::new(id))
            })?;
            if !ticket.exists() {
                return Err(BookingFlowError::InvalidTicketType);
            }

            let decided = ticket
                .handle(&TicketTypeCommand::ReleaseUnit(ReleaseUnit {
                    ticket_type_id,
                    occurred_at: Utc::now(),
                }))
                .map_err(BookingFlowError::Domain)?;

            let batch = StreamAppend {
                events: to_uncommitted(ticket_type_id.0, TICKET_TYPE_AGGREGATE, &decided)?,
                expected_version: ExpectedVersion::Exact(ticket.version()),
            };

            let committed = match self.store.append_atomic(vec![batch]) {
                Ok(c) => c,
                Err(EventStoreError::Concurrency(msg)) => {
                    warn!(attempt, %msg, "inventory moved underneath us; re-validating");
                    continue;
                }
                Err(e) => return Err(BookingFlowError::Persistence(e)),
            };

            self.publish(&committed)?;
            return Ok(ticket.available() + 1);
        }

        Err(BookingFlowError::Conflict)
    }

    fn publish(&self, committed: &[StoredEvent]) -> Result<(), BookingFlowError> {
        for stored in committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| BookingFlowError::Publish(format!("{e:?}")))?;
        }
        Ok(())
    }

    /// Rehydrate an aggregate from its stream (strong read).
    fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, BookingFlowError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DeserializeOwned,
    {
        let mut history = self.store.load_stream(aggregate_id)?;
        history.sort_by_key(|e| e.sequence_number);

        let mut aggregate = make_aggregate(aggregate_id);
        for stored in history {
            let ev: A::Event = serde_json::from_value(stored.payload)
                .map_err(|e| BookingFlowError::Deserialize(e.to_string()))?;
            aggregate.apply(&ev);
        }
        Ok(aggregate)
    }
}

fn to_uncommitted<E>(
    aggregate_id: AggregateId,
    aggregate_type: &str,
    events: &[E],
) -> Result<Vec<UncommittedEvent>, BookingFlowError>
where
    E: DomainEvent + Serialize,
{
    events
        .iter()
        .map(|ev| {
            UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev)
                .map_err(BookingFlowError::Persistence)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::Duration;
    use gatepass_catalog::{
        ApproveEvent, CreateTicketType, EventCommand, RefundPolicy, SubmitEvent,
    };
    use gatepass_messaging::InMemoryEventBus;

    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::InMemoryEventStore;
    use crate::payments::MockPaymentProvider;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Flow = BookingFlow<Arc<InMemoryEventStore>, Bus>;

    struct Fixture {
        store: Arc<InMemoryEventStore>,
        bus: Bus,
        flow: Flow,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryEventStore::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let flow = BookingFlow::new(
            store.clone(),
            bus.clone(),
            FeePolicy::default(),
            Arc::new(MockPaymentProvider),
        );
        Fixture { store, bus, flow }
    }

    fn seed_event(fx: &Fixture, approve: bool) -> EventId {
        let dispatcher = CommandDispatcher::new(fx.store.clone(), fx.bus.clone());
        let agg = AggregateId::new();
        let event_id = EventId::new(agg);
        let now = Utc::now();

        dispatcher
            .dispatch::<Event>(
                agg,
                "catalog.event",
                EventCommand::SubmitEvent(SubmitEvent {
                    event_id,
                    host_id: UserId::new(),
                    title: "Open Air".to_string(),
                    venue: "Pier 9".to_string(),
                    starts_at: now + Duration::days(3),
                    ends_at: now + Duration::days(3) + Duration::hours(4),
                    occurred_at: now,
                }),
                |id| Event::empty(EventId::new(id)),
            )
            .unwrap();

        if approve {
            dispatcher
                .dispatch::<Event>(
                    agg,
                    "catalog.event",
                    EventCommand::ApproveEvent(ApproveEvent {
                        event_id,
                        occurred_at: now,
                    }),
                    |id| Event::empty(EventId::new(id)),
                )
                .unwrap();
        }

        event_id
    }

    fn seed_ticket(fx: &Fixture, event_id: EventId, price: u64, total: u64) -> TicketTypeId {
        let dispatcher = CommandDispatcher::new(fx.store.clone(), fx.bus.clone());
        let agg = AggregateId::new();
        let ticket_type_id = TicketTypeId::new(agg);

        dispatcher
            .dispatch::<TicketType>(
                agg,
                TICKET_TYPE_AGGREGATE,
                TicketTypeCommand::CreateTicketType(CreateTicketType {
                    ticket_type_id,
                    event_id,
                    name: "GA".to_string(),
                    price,
                    total,
                    refund_policy: RefundPolicy::NonRefundable,
                    occurred_at: Utc::now(),
                }),
                |id| TicketType::empty(TicketTypeId::new(id)),
            )
            .unwrap();

        ticket_type_id
    }

    fn request(event_id: EventId, ticket_type_id: TicketTypeId) -> CreateBooking {
        CreateBooking {
            event_id,
            ticket_type_id,
            price_paid: None,
            user_id: UserId::new(),
            booker: BookerContact {
                name: Some("Asha".to_string()),
                phone: Some("+15550001111".to_string()),
                email: None,
            },
        }
    }

    fn ticket_available(fx: &Fixture, ticket_type_id: TicketTypeId) -> u64 {
        fx.flow
            .load(ticket_type_id.0, |id| TicketType::empty(TicketTypeId::new(id)))
            .unwrap()
            .available()
    }

    #[test]
    fn booking_creates_both_records_and_decrements_inventory() {
        let fx = fixture();
        let event_id = seed_event(&fx, true);
        let ticket_type_id = seed_ticket(&fx, event_id, 1_000, 5);

        let receipt = fx.flow.create_booking(request(event_id, ticket_type_id)).unwrap();

        assert_eq!(receipt.price_paid, 1_000);
        assert_eq!(receipt.status, BookingStatus::Requested);
        assert_eq!(receipt.refund_status, RefundStatus::None);
        assert!(receipt.check_in_code.starts_with("CHK-"));

        // Exactly 10% platform fee, the rest to the host.
        assert_eq!(receipt.transaction.amount, 1_000);
        assert_eq!(receipt.transaction.platform_fee, 100);
        assert_eq!(receipt.transaction.payout_to_host, 900);
        assert_eq!(receipt.transaction.status, TransactionStatus::Completed);

        assert_eq!(ticket_available(&fx, ticket_type_id), 4);

        // Both new streams exist with the expected shapes.
        assert_eq!(fx.store.load_stream(receipt.booking_id.0).unwrap().len(), 1);
        assert_eq!(
            fx.store
                .load_stream(receipt.transaction.transaction_id.0)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn pending_event_is_not_bookable() {
        let fx = fixture();
        let event_id = seed_event(&fx, false);
        let ticket_type_id = seed_ticket(&fx, event_id, 1_000, 5);

        let err = fx
            .flow
            .create_booking(request(event_id, ticket_type_id))
            .unwrap_err();
        assert!(matches!(err, BookingFlowError::EventNotBookable));
        assert_eq!(ticket_available(&fx, ticket_type_id), 5);
    }

    #[test]
    fn ticket_must_belong_to_the_supplied_event() {
        let fx = fixture();
        let event_a = seed_event(&fx, true);
        let event_b = seed_event(&fx, true);
        let ticket_of_a = seed_ticket(&fx, event_a, 1_000, 5);

        let err = fx
            .flow
            .create_booking(request(event_b, ticket_of_a))
            .unwrap_err();
        assert!(matches!(err, BookingFlowError::InvalidTicketType));
    }

    #[test]
    fn unknown_ticket_type_is_invalid() {
        let fx = fixture();
        let event_id = seed_event(&fx, true);

        let err = fx
            .flow
            .create_booking(request(event_id, TicketTypeId::new(AggregateId::new())))
            .unwrap_err();
        assert!(matches!(err, BookingFlowError::InvalidTicketType));
    }

    #[test]
    fn sold_out_pool_is_refused() {
        let fx = fixture();
        let event_id = seed_event(&fx, true);
        let ticket_type_id = seed_ticket(&fx, event_id, 1_000, 1);

        fx.flow.create_booking(request(event_id, ticket_type_id)).unwrap();

        let err = fx
            .flow
            .create_booking(request(event_id, ticket_type_id))
            .unwrap_err();
        assert!(matches!(err, BookingFlowError::SoldOut));
        assert_eq!(ticket_available(&fx, ticket_type_id), 0);
    }

    #[test]
    fn declared_price_must_match_ticket_price() {
        let fx = fixture();
        let event_id = seed_event(&fx, true);
        let ticket_type_id = seed_ticket(&fx, event_id, 1_000, 5);

        let mut req = request(event_id, ticket_type_id);
        req.price_paid = Some(1);

        let err = fx.flow.create_booking(req).unwrap_err();
        assert!(matches!(
            err,
            BookingFlowError::PriceMismatch {
                expected: 1_000,
                supplied: 1
            }
        ));
        assert_eq!(ticket_available(&fx, ticket_type_id), 5);
    }

    #[test]
    fn concurrent_bookings_never_oversell() {
        let fx = fixture();
        let event_id = seed_event(&fx, true);
        let ticket_type_id = seed_ticket(&fx, event_id, 1_000, 1);

        let successes = AtomicU32::new(0);
        let refusals = AtomicU32::new(0);

        std::thread::scope(|scope| {
            for _ in 0..10 {
                scope.spawn(|| match fx.flow.create_booking(request(event_id, ticket_type_id)) {
                    Ok(_) => {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(BookingFlowError::SoldOut) | Err(BookingFlowError::Conflict) => {
                        refusals.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(other) => panic!("unexpected error under contention: {other:?}"),
                });
            }
        });

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(refusals.load(Ordering::SeqCst), 9);
        assert_eq!(ticket_available(&fx, ticket_type_id), 0);
    }

    #[test]
    fn release_restores_one_unit_but_never_exceeds_total() {
        let fx = fixture();
        let event_id = seed_event(&fx, true);
        let ticket_type_id = seed_ticket(&fx, event_id, 1_000, 1);

        fx.flow.create_booking(request(event_id, ticket_type_id)).unwrap();
        assert_eq!(ticket_available(&fx, ticket_type_id), 0);

        assert_eq!(fx.flow.release_inventory(ticket_type_id).unwrap(), 1);

        let err = fx.flow.release_inventory(ticket_type_id).unwrap_err();
        assert!(matches!(
            err,
            BookingFlowError::Domain(DomainError::InvariantViolation(_))
        ));
        assert_eq!(ticket_available(&fx, ticket_type_id), 1);
    }

    #[test]
    fn release_of_unknown_ticket_is_invalid() {
        let fx = fixture();
        let err = fx
            .flow
            .release_inventory(TicketTypeId::new(AggregateId::new()))
            .unwrap_err();
        assert!(matches!(err, BookingFlowError::InvalidTicketType));
    }

    /// Store wrapper that fails every atomic append after validation would
    /// have passed, simulating an unavailable backend.
    struct FailingStore {
        inner: Arc<InMemoryEventStore>,
    }

    impl EventStore for FailingStore {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.append(events, expected_version)
        }

        fn append_atomic(
            &self,
            _batches: Vec<StreamAppend>,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            Err(EventStoreError::InvalidAppend("injected failure".to_string()))
        }

        fn load_stream(
            &self,
            aggregate_id: AggregateId,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(aggregate_id)
        }
    }

    #[test]
    fn store_failure_after_validation_leaves_nothing_behind() {
        let fx = fixture();
        let event_id = seed_event(&fx, true);
        let ticket_type_id = seed_ticket(&fx, event_id, 1_000, 5);

        let failing = BookingFlow::new(
            FailingStore {
                inner: fx.store.clone(),
            },
            fx.bus.clone(),
            FeePolicy::default(),
            Arc::new(MockPaymentProvider),
        );

        let sub = fx.bus.subscribe();
        let err = failing
            .create_booking(request(event_id, ticket_type_id))
            .unwrap_err();
        assert!(matches!(err, BookingFlowError::Persistence(_)));

        // No decrement, and nothing was published for projections to see.
        assert_eq!(ticket_available(&fx, ticket_type_id), 5);
        assert!(sub.try_recv().is_err());
    }

    /// Store wrapper that reports a write conflict on every atomic append.
    struct ContendedStore {
        inner: Arc<InMemoryEventStore>,
        attempts: AtomicU32,
    }

    impl EventStore for ContendedStore {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.append(events, expected_version)
        }

        fn append_atomic(
            &self,
            _batches: Vec<StreamAppend>,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(EventStoreError::Concurrency("injected conflict".to_string()))
        }

        fn load_stream(
            &self,
            aggregate_id: AggregateId,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(aggregate_id)
        }
    }

    #[test]
    fn retries_are_bounded_and_surface_conflict() {
        let fx = fixture();
        let event_id = seed_event(&fx, true);
        let ticket_type_id = seed_ticket(&fx, event_id, 1_000, 5);

        let contended = ContendedStore {
            inner: fx.store.clone(),
            attempts: AtomicU32::new(0),
        };
        let flow = BookingFlow::new(
            contended,
            fx.bus.clone(),
            FeePolicy::default(),
            Arc::new(MockPaymentProvider),
        );

        let err = flow
            .create_booking(request(event_id, ticket_type_id))
            .unwrap_err();
        assert!(matches!(err, BookingFlowError::Conflict));

        assert_eq!(flow.store.attempts.load(Ordering::SeqCst), MAX_WRITE_ATTEMPTS);
    }
}
