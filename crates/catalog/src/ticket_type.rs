use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatepass_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use gatepass_messaging::DomainEvent;

use crate::event::EventId;

/// Ticket type identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketTypeId(pub AggregateId);

impl TicketTypeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TicketTypeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Refund policy attached to a ticket type at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RefundPolicy {
    #[default]
    NonRefundable,
    PartialRefund,
    FullRefund,
    CustomPolicy,
}

/// Aggregate root: TicketType.
///
/// The sole owner of its availability counters; no other entity may
/// decrement them. Invariant: `0 <= available <= total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketType {
    id: TicketTypeId,
    event_id: Option<EventId>,
    name: String,
    /// Unit price in the smallest currency unit.
    price: u64,
    total: u64,
    available: u64,
    refund_policy: RefundPolicy,
    version: u64,
    created: bool,
}

impl TicketType {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TicketTypeId) -> Self {
        Self {
            id,
            event_id: None,
            name: String::new(),
            price: 0,
            total: 0,
            available: 0,
            refund_policy: RefundPolicy::NonRefundable,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TicketTypeId {
        self.id
    }

    pub fn event_id(&self) -> Option<EventId> {
        self.event_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn refund_policy(&self) -> RefundPolicy {
        self.refund_policy
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn is_sold_out(&self) -> bool {
        self.available == 0
    }
}

impl AggregateRoot for TicketType {
    type Id = TicketTypeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTicketType.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTicketType {
    pub ticket_type_id: TicketTypeId,
    pub event_id: EventId,
    pub name: String,
    pub price: u64,
    pub total: u64,
    pub refund_policy: RefundPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveUnit (claim one unit of inventory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveUnit {
    pub ticket_type_id: TicketTypeId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseUnit (compensating operation; restores one unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseUnit {
    pub ticket_type_id: TicketTypeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketTypeCommand {
    CreateTicketType(CreateTicketType),
    ReserveUnit(ReserveUnit),
    ReleaseUnit(ReleaseUnit),
}

/// Event: TicketTypeCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTypeCreated {
    pub ticket_type_id: TicketTypeId,
    pub event_id: EventId,
    pub name: String,
    pub price: u64,
    pub total: u64,
    pub refund_policy: RefundPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReserved {
    pub ticket_type_id: TicketTypeId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UnitReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReleased {
    pub ticket_type_id: TicketTypeId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketTypeEvent {
    TicketTypeCreated(TicketTypeCreated),
    UnitReserved(UnitReserved),
    UnitReleased(UnitReleased),
}

impl DomainEvent for TicketTypeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketTypeEvent::TicketTypeCreated(_) => "catalog.ticket_type.created",
            TicketTypeEvent::UnitReserved(_) => "catalog.ticket_type.unit_reserved",
            TicketTypeEvent::UnitReleased(_) => "catalog.ticket_type.unit_released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TicketTypeEvent::TicketTypeCreated(e) => e.occurred_at,
            TicketTypeEvent::UnitReserved(e) => e.occurred_at,
            TicketTypeEvent::UnitReleased(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TicketType {
    type Command = TicketTypeCommand;
    type Event = TicketTypeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TicketTypeEvent::TicketTypeCreated(e) => {
                self.id = e.ticket_type_id;
                self.event_id = Some(e.event_id);
                self.name = e.name.clone();
                self.price = e.price;
                self.total = e.total;
                self.available = e.total;
                self.refund_policy = e.refund_policy;
                self.created = true;
            }
            TicketTypeEvent::UnitReserved(_) => {
                self.available -= 1;
            }
            TicketTypeEvent::UnitReleased(_) => {
                self.available += 1;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TicketTypeCommand::CreateTicketType(cmd) => self.handle_create(cmd),
            TicketTypeCommand::ReserveUnit(cmd) => self.handle_reserve(cmd),
            TicketTypeCommand::ReleaseUnit(cmd) => self.handle_release(cmd),
        }
    }
}

impl TicketType {
    fn ensure_ticket_type_id(&self, ticket_type_id: TicketTypeId) -> Result<(), DomainError> {
        if self.id != ticket_type_id {
            return Err(DomainError::invariant("ticket_type_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateTicketType) -> Result<Vec<TicketTypeEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("ticket type already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![TicketTypeEvent::TicketTypeCreated(TicketTypeCreated {
            ticket_type_id: cmd.ticket_type_id,
            event_id: cmd.event_id,
            name: cmd.name.clone(),
            price: cmd.price,
            total: cmd.total,
            refund_policy: cmd.refund_policy,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveUnit) -> Result<Vec<TicketTypeEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ticket_type_id(cmd.ticket_type_id)?;

        if self.available == 0 {
            return Err(DomainError::invariant("no inventory remaining"));
        }

        Ok(vec![TicketTypeEvent::UnitReserved(UnitReserved {
            ticket_type_id: cmd.ticket_type_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseUnit) -> Result<Vec<TicketTypeEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_ticket_type_id(cmd.ticket_type_id)?;

        if self.available >= self.total {
            return Err(DomainError::invariant("all units already available"));
        }

        Ok(vec![TicketTypeEvent::UnitReleased(UnitReleased {
            ticket_type_id: cmd.ticket_type_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
