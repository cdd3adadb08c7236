use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatepass_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use gatepass_messaging::DomainEvent;

/// Event identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub AggregateId);

impl EventId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Event lifecycle.
///
/// Hosts submit events as `pending`; admins approve to `live` or reject to
/// `canceled`. Only `live` events accept bookings. `draft` is a declared
/// status value the core never produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Pending,
    Live,
    Canceled,
}

/// Aggregate root: Event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    id: EventId,
    host_id: Option<UserId>,
    title: String,
    venue: String,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    status: EventStatus,
    version: u64,
    created: bool,
}

impl Event {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: EventId) -> Self {
        Self {
            id,
            host_id: None,
            title: String::new(),
            venue: String::new(),
            starts_at: None,
            ends_at: None,
            status: EventStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> EventId {
        self.id
    }

    pub fn host_id(&self) -> Option<UserId> {
        self.host_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.starts_at
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    /// Only live events accept bookings.
    pub fn is_bookable(&self) -> bool {
        matches!(self.status, EventStatus::Live)
    }
}

impl AggregateRoot for Event {
    type Id = EventId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitEvent (host submits for moderation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitEvent {
    pub event_id: EventId,
    pub host_id: UserId,
    pub title: String,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveEvent (admin moderation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveEvent {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectEvent (admin moderation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectEvent {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCommand {
    SubmitEvent(SubmitEvent),
    ApproveEvent(ApproveEvent),
    RejectEvent(RejectEvent),
}

/// Event: EventSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSubmitted {
    pub event_id: EventId,
    pub host_id: UserId,
    pub title: String,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EventApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventApproved {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EventRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRejected {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLifecycleEvent {
    EventSubmitted(EventSubmitted),
    EventApproved(EventApproved),
    EventRejected(EventRejected),
}

impl DomainEvent for EventLifecycleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            EventLifecycleEvent::EventSubmitted(_) => "catalog.event.submitted",
            EventLifecycleEvent::EventApproved(_) => "catalog.event.approved",
            EventLifecycleEvent::EventRejected(_) => "catalog.event.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            EventLifecycleEvent::EventSubmitted(e) => e.occurred_at,
            EventLifecycleEvent::EventApproved(e) => e.occurred_at,
            EventLifecycleEvent::EventRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Event {
    type Command = EventCommand;
    type Event = EventLifecycleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            EventLifecycleEvent::EventSubmitted(e) => {
                self.id = e.event_id;
                self.host_id = Some(e.host_id);
                self.title = e.title.clone();
                self.venue = e.venue.clone();
                self.starts_at = Some(e.starts_at);
                self.ends_at = Some(e.ends_at);
                self.status = EventStatus::Pending;
                self.created = true;
            }
            EventLifecycleEvent::EventApproved(_) => {
                self.status = EventStatus::Live;
            }
            EventLifecycleEvent::EventRejected(_) => {
                self.status = EventStatus::Canceled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            EventCommand::SubmitEvent(cmd) => self.handle_submit(cmd),
            EventCommand::ApproveEvent(cmd) => self.handle_approve(cmd),
            EventCommand::RejectEvent(cmd) => self.handle_reject(cmd),
        }
    }
}

impl Event {
    fn ensure_event_id(&self, event_id: EventId) -> Result<(), DomainError> {
        if self.id != event_id {
            return Err(DomainError::invariant("event_id mismatch"));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitEvent) -> Result<Vec<EventLifecycleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("event already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if cmd.venue.trim().is_empty() {
            return Err(DomainError::validation("venue cannot be empty"));
        }
        if cmd.ends_at <= cmd.starts_at {
            return Err(DomainError::validation("ends_at must be after starts_at"));
        }

        Ok(vec![EventLifecycleEvent::EventSubmitted(EventSubmitted {
            event_id: cmd.event_id,
            host_id: cmd.host_id,
            title: cmd.title.clone(),
            venue: cmd.venue.clone(),
            starts_at: cmd.starts_at,
            ends_at: cmd.ends_at,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveEvent) -> Result<Vec<EventLifecycleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_event_id(cmd.event_id)?;

        if self.status != EventStatus::Pending {
            return Err(DomainError::invariant("only pending events can be approved"));
        }

        Ok(vec![EventLifecycleEvent::EventApproved(EventApproved {
            event_id: cmd.event_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectEvent) -> Result<Vec<EventLifecycleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_event_id(cmd.event_id)?;

        if self.status != EventStatus::Pending {
            return Err(DomainError::invariant("only pending events can be rejected"));
        }

        Ok(vec![EventLifecycleEvent::EventRejected(EventRejected {
            event_id: cmd.event_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
