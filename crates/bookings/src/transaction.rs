use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gatepass_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use gatepass_messaging::DomainEvent;

use crate::booking::BookingId;

/// Payment transaction identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub AggregateId);

impl TransactionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Transaction lifecycle.
///
/// Recorded as `pending`, completed by an explicit provider confirmation.
/// A real gateway integration would drive the transition from a webhook;
/// the mock provider confirms synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Aggregate root: PaymentTransaction.
///
/// Exclusively owned by exactly one booking; never created without one.
/// Invariant: `platform_fee + payout_to_host == amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTransaction {
    id: TransactionId,
    booking_id: Option<BookingId>,
    /// Amounts in the smallest currency unit.
    amount: u64,
    platform_fee: u64,
    payout_to_host: u64,
    provider_ref: Option<String>,
    status: TransactionStatus,
    version: u64,
    created: bool,
}

impl PaymentTransaction {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TransactionId) -> Self {
        Self {
            id,
            booking_id: None,
            amount: 0,
            platform_fee: 0,
            payout_to_host: 0,
            provider_ref: None,
            status: TransactionStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TransactionId {
        self.id
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn platform_fee(&self) -> u64 {
        self.platform_fee
    }

    pub fn payout_to_host(&self) -> u64 {
        self.payout_to_host
    }

    pub fn provider_ref(&self) -> Option<&str> {
        self.provider_ref.as_deref()
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for PaymentTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordPayment (transaction starts `pending`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub transaction_id: TransactionId,
    pub booking_id: BookingId,
    pub amount: u64,
    pub platform_fee: u64,
    pub payout_to_host: u64,
    pub provider_ref: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPayment (provider boundary reported success).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionCommand {
    RecordPayment(RecordPayment),
    ConfirmPayment(ConfirmPayment),
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub transaction_id: TransactionId,
    pub booking_id: BookingId,
    pub amount: u64,
    pub platform_fee: u64,
    pub payout_to_host: u64,
    pub provider_ref: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    PaymentRecorded(PaymentRecorded),
    PaymentConfirmed(PaymentConfirmed),
}

impl DomainEvent for TransactionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::PaymentRecorded(_) => "bookings.transaction.recorded",
            TransactionEvent::PaymentConfirmed(_) => "bookings.transaction.confirmed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TransactionEvent::PaymentRecorded(e) => e.occurred_at,
            TransactionEvent::PaymentConfirmed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PaymentTransaction {
    type Command = TransactionCommand;
    type Event = TransactionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TransactionEvent::PaymentRecorded(e) => {
                self.id = e.transaction_id;
                self.booking_id = Some(e.booking_id);
                self.amount = e.amount;
                self.platform_fee = e.platform_fee;
                self.payout_to_host = e.payout_to_host;
                self.provider_ref = Some(e.provider_ref.clone());
                self.status = TransactionStatus::Pending;
                self.created = true;
            }
            TransactionEvent::PaymentConfirmed(_) => {
                self.status = TransactionStatus::Completed;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TransactionCommand::RecordPayment(cmd) => self.handle_record(cmd),
            TransactionCommand::ConfirmPayment(cmd) => self.handle_confirm(cmd),
        }
    }
}

impl PaymentTransaction {
    fn handle_record(&self, cmd: &RecordPayment) -> Result<Vec<TransactionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("transaction already exists"));
        }

        match cmd.platform_fee.checked_add(cmd.payout_to_host) {
            Some(sum) if sum == cmd.amount => {}
            _ => {
                return Err(DomainError::invariant(
                    "platform_fee + payout_to_host must equal amount",
                ));
            }
        }

        if cmd.provider_ref.trim().is_empty() {
            return Err(DomainError::validation("provider_ref cannot be empty"));
        }

        Ok(vec![TransactionEvent::PaymentRecorded(PaymentRecorded {
            transaction_id: cmd.transaction_id,
            booking_id: cmd.booking_id,
            amount: cmd.amount,
            platform_fee: cmd.platform_fee,
            payout_to_host: cmd.payout_to_host,
            provider_ref: cmd.provider_ref.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmPayment) -> Result<Vec<TransactionEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.id != cmd.transaction_id {
            return Err(DomainError::invariant("transaction_id mismatch"));
        }
        if self.status != TransactionStatus::Pending {
            return Err(DomainError::invariant(
                "only pending transactions can be confirmed",
            ));
        }

        Ok(vec![TransactionEvent::PaymentConfirmed(PaymentConfirmed {
            transaction_id: cmd.transaction_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
