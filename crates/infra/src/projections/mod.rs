//! Disposable read models fed by published envelopes.
//!
//! Projections are rebuildable from the event stream and idempotent for
//! at-least-once delivery: replays at or below the stream cursor are
//! ignored.

pub mod booking_ledger;
pub mod event_directory;
pub mod ticket_availability;

pub use booking_ledger::{BookingLedgerProjection, BookingRecord};
pub use event_directory::{EventDirectoryProjection, EventSummary};
pub use ticket_availability::{TicketAvailabilityProjection, TicketTypeSummary};

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use gatepass_core::AggregateId;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-stream cursors supporting idempotent, ordered envelope application.
#[derive(Debug, Default)]
pub(crate) struct Cursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

/// Outcome of a cursor check for an incoming envelope.
pub(crate) enum CursorCheck {
    Apply,
    /// Duplicate or replay; safe to ignore.
    Skip,
}

impl Cursors {
    pub(crate) fn check(
        &self,
        aggregate_id: AggregateId,
        seq: u64,
    ) -> Result<CursorCheck, ProjectionError> {
        let cursors = match self.inner.read() {
            Ok(c) => c,
            Err(_) => return Ok(CursorCheck::Skip),
        };
        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(CursorCheck::Skip);
        }
        // The first event of a stream may arrive at any positive sequence
        // (stores start at 1); after that, strict increments only.
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        Ok(CursorCheck::Apply)
    }

    pub(crate) fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}
