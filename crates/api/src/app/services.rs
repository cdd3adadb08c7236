//! Infrastructure wiring: store, bus, dispatcher, booking flow, projections.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use gatepass_bookings::{BookingId, FeePolicy};
use gatepass_catalog::{Event, EventId, EventLifecycleEvent, TicketTypeId};
use gatepass_core::{Aggregate, AggregateId, DomainError, UserId};
use gatepass_infra::booking_directory::{BookingDirectory, EnrichedBooking};
use gatepass_infra::booking_flow::{BookingFlow, BookingFlowError, BookingReceipt, CreateBooking};
use gatepass_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use gatepass_infra::event_store::{EventStore, InMemoryEventStore, StoredEvent};
use gatepass_infra::payments::MockPaymentProvider;
use gatepass_infra::projections::{
    BookingLedgerProjection, BookingRecord, EventDirectoryProjection, EventSummary,
    TicketAvailabilityProjection, TicketTypeSummary,
};
use gatepass_infra::read_model::InMemoryReadModelStore;
use gatepass_messaging::{DomainEvent, EventBus, EventEnvelope, InMemoryEventBus};

#[cfg(feature = "postgres")]
use gatepass_infra::event_store::PostgresEventStore;
#[cfg(feature = "postgres")]
use sqlx::PgPool;

type JsonEnvelope = EventEnvelope<JsonValue>;
type Bus = Arc<InMemoryEventBus<JsonEnvelope>>;

type EventsStore = Arc<InMemoryReadModelStore<EventId, EventSummary>>;
type TicketsStore = Arc<InMemoryReadModelStore<TicketTypeId, TicketTypeSummary>>;
type BookingsStore = Arc<InMemoryReadModelStore<BookingId, BookingRecord>>;

type EventsProjection = EventDirectoryProjection<EventsStore>;
type TicketsProjection = TicketAvailabilityProjection<TicketsStore>;
type BookingsProjection = BookingLedgerProjection<BookingsStore>;
type Directory = BookingDirectory<EventsStore, TicketsStore, BookingsStore>;

type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;
type InMemoryFlow = BookingFlow<Arc<InMemoryEventStore>, Bus>;

#[cfg(feature = "postgres")]
type PersistentDispatcher = CommandDispatcher<Arc<PostgresEventStore>, Bus>;
#[cfg(feature = "postgres")]
type PersistentFlow = BookingFlow<Arc<PostgresEventStore>, Bus>;

#[derive(Clone)]
pub enum AppServices {
    InMemory {
        dispatcher: Arc<InMemoryDispatcher>,
        flow: Arc<InMemoryFlow>,
        directory: Arc<Directory>,
        events: Arc<EventsProjection>,
        tickets: Arc<TicketsProjection>,
        store: Arc<InMemoryEventStore>,
    },
    #[cfg(feature = "postgres")]
    Persistent {
        dispatcher: Arc<PersistentDispatcher>,
        flow: Arc<PersistentFlow>,
        directory: Arc<Directory>,
        events: Arc<EventsProjection>,
        tickets: Arc<TicketsProjection>,
        store: Arc<PostgresEventStore>,
    },
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "postgres")]
        {
            return build_persistent_services().await;
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
            );
            return build_in_memory_services();
        }
    }

    build_in_memory_services()
}

fn fee_policy_from_env() -> FeePolicy {
    let Some(raw) = std::env::var("FEE_RATE_BPS").ok() else {
        return FeePolicy::default();
    };

    match raw.parse::<u32>().map_err(|e| e.to_string()).and_then(|bps| {
        FeePolicy::new(bps).map_err(|e| e.to_string())
    }) {
        Ok(policy) => policy,
        Err(e) => {
            tracing::warn!("invalid FEE_RATE_BPS ({e}); using default fee policy");
            FeePolicy::default()
        }
    }
}

struct Projections {
    events: Arc<EventsProjection>,
    tickets: Arc<TicketsProjection>,
    bookings: Arc<BookingsProjection>,
}

fn build_projections(bus: &Bus) -> Projections {
    let events: Arc<EventsProjection> = Arc::new(EventDirectoryProjection::new(Arc::new(
        InMemoryReadModelStore::new(),
    )));
    let tickets: Arc<TicketsProjection> = Arc::new(TicketAvailabilityProjection::new(Arc::new(
        InMemoryReadModelStore::new(),
    )));
    let bookings: Arc<BookingsProjection> = Arc::new(BookingLedgerProjection::new(Arc::new(
        InMemoryReadModelStore::new(),
    )));

    // Background subscriber: bus -> projections.
    {
        let sub = bus.subscribe();
        let events = events.clone();
        let tickets = tickets.clone();
        let bookings = bookings.clone();
        tokio::task::spawn_blocking(move || {
            loop {
                match sub.recv() {
                    Ok(env) => {
                        let applied = match env.aggregate_type() {
                            "catalog.event" => events.apply_envelope(&env).map_err(|e| e.to_string()),
                            "catalog.ticket_type" => {
                                tickets.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            "bookings.booking" => {
                                bookings.apply_envelope(&env).map_err(|e| e.to_string())
                            }
                            // Transaction events have no read model; receipts
                            // are returned on the write path.
                            _ => Ok(()),
                        };

                        if let Err(e) = applied {
                            tracing::warn!("projection apply failed: {e}");
                        }
                    }
                    Err(_) => break,
                }
            }
        });
    }

    Projections {
        events,
        tickets,
        bookings,
    }
}

fn build_in_memory_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let projections = build_projections(&bus);

    let dispatcher: Arc<InMemoryDispatcher> =
        Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));
    let flow: Arc<InMemoryFlow> = Arc::new(BookingFlow::new(
        store.clone(),
        bus.clone(),
        fee_policy_from_env(),
        Arc::new(MockPaymentProvider),
    ));
    let directory = Arc::new(BookingDirectory::new(
        projections.events.clone(),
        projections.tickets.clone(),
        projections.bookings.clone(),
    ));

    AppServices::InMemory {
        dispatcher,
        flow,
        directory,
        events: projections.events,
        tickets: projections.tickets,
        store,
    }
}

#[cfg(feature = "postgres")]
async fn build_persistent_services() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let store = Arc::new(PostgresEventStore::new(pool));
    store
        .ensure_schema()
        .await
        .expect("failed to ensure events schema");

    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let projections = build_projections(&bus);

    let dispatcher: Arc<PersistentDispatcher> =
        Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));
    let flow: Arc<PersistentFlow> = Arc::new(BookingFlow::new(
        store.clone(),
        bus.clone(),
        fee_policy_from_env(),
        Arc::new(MockPaymentProvider),
    ));
    let directory = Arc::new(BookingDirectory::new(
        projections.events.clone(),
        projections.tickets.clone(),
        projections.bookings.clone(),
    ));

    AppServices::Persistent {
        dispatcher,
        flow,
        directory,
        events: projections.events,
        tickets: projections.tickets,
        store,
    }
}

impl AppServices {
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DomainEvent + Serialize + DeserializeOwned,
    {
        match self {
            AppServices::InMemory { dispatcher, .. } => {
                dispatcher.dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)
            }
            #[cfg(feature = "postgres")]
            AppServices::Persistent { dispatcher, .. } => {
                dispatcher.dispatch::<A>(aggregate_id, aggregate_type, command, make_aggregate)
            }
        }
    }

    pub fn create_booking(&self, req: CreateBooking) -> Result<BookingReceipt, BookingFlowError> {
        match self {
            AppServices::InMemory { flow, .. } => flow.create_booking(req),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { flow, .. } => flow.create_booking(req),
        }
    }

    pub fn bookings_for_user(&self, user_id: UserId) -> Vec<EnrichedBooking> {
        match self {
            AppServices::InMemory { directory, .. } => directory.list_for_user(user_id),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { directory, .. } => directory.list_for_user(user_id),
        }
    }

    pub fn bookings_for_host(&self, host_id: UserId) -> Vec<EnrichedBooking> {
        match self {
            AppServices::InMemory { directory, .. } => directory.list_for_host(host_id),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { directory, .. } => directory.list_for_host(host_id),
        }
    }

    pub fn bookings_all(&self) -> Vec<EnrichedBooking> {
        match self {
            AppServices::InMemory { directory, .. } => directory.list_all(),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { directory, .. } => directory.list_all(),
        }
    }

    pub fn events_live(&self) -> Vec<EventSummary> {
        match self {
            AppServices::InMemory { events, .. } => events.list_live(),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { events, .. } => events.list_live(),
        }
    }

    pub fn events_for_host(&self, host_id: UserId) -> Vec<EventSummary> {
        match self {
            AppServices::InMemory { events, .. } => events.list_for_host(host_id),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { events, .. } => events.list_for_host(host_id),
        }
    }

    pub fn event_summary(&self, event_id: &EventId) -> Option<EventSummary> {
        match self {
            AppServices::InMemory { events, .. } => events.get(event_id),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { events, .. } => events.get(event_id),
        }
    }

    pub fn tickets_for_event(&self, event_id: EventId) -> Vec<TicketTypeSummary> {
        match self {
            AppServices::InMemory { tickets, .. } => tickets.list_for_event(event_id),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { tickets, .. } => tickets.list_for_event(event_id),
        }
    }

    /// Strongly consistent event read (rehydrated from the store), for
    /// checks that must not race the projections, e.g. ticket-creation
    /// ownership.
    pub fn event_record(&self, event_id: EventId) -> Option<Event> {
        match self {
            AppServices::InMemory { store, .. } => load_event(store, event_id),
            #[cfg(feature = "postgres")]
            AppServices::Persistent { store, .. } => load_event(store, event_id),
        }
    }
}

fn load_event<S: EventStore>(store: &S, event_id: EventId) -> Option<Event> {
    let mut history = store.load_stream(event_id.0).ok()?;
    history.sort_by_key(|e| e.sequence_number);

    let mut event = Event::empty(event_id);
    for stored in history {
        let ev: EventLifecycleEvent = serde_json::from_value(stored.payload).ok()?;
        event.apply(&ev);
    }

    event.exists().then_some(event)
}
