use serde_json::Value as JsonValue;

use gatepass_catalog::{EventId, RefundPolicy, TicketTypeEvent, TicketTypeId};
use gatepass_messaging::EventEnvelope;

use super::{CursorCheck, Cursors, ProjectionError};
use crate::read_model::ReadModelStore;

/// Queryable ticket availability: current counters per ticket type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketTypeSummary {
    pub ticket_type_id: TicketTypeId,
    pub event_id: EventId,
    pub name: String,
    pub price: u64,
    pub total: u64,
    pub available: u64,
    pub refund_policy: RefundPolicy,
}

/// Ticket availability projection.
///
/// Read models are disposable and rebuildable from the event stream.
#[derive(Debug)]
pub struct TicketAvailabilityProjection<S>
where
    S: ReadModelStore<TicketTypeId, TicketTypeSummary>,
{
    store: S,
    cursors: Cursors,
}

impl<S> TicketAvailabilityProjection<S>
where
    S: ReadModelStore<TicketTypeId, TicketTypeSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::default(),
        }
    }

    pub fn get(&self, ticket_type_id: &TicketTypeId) -> Option<TicketTypeSummary> {
        self.store.get(ticket_type_id)
    }

    pub fn list_for_event(&self, event_id: EventId) -> Vec<TicketTypeSummary> {
        self.store
            .list()
            .into_iter()
            .filter(|t| t.event_id == event_id)
            .collect()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let CursorCheck::Skip = self.cursors.check(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: TicketTypeEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let ticket_type_id = match &ev {
            TicketTypeEvent::TicketTypeCreated(e) => e.ticket_type_id,
            TicketTypeEvent::UnitReserved(e) => e.ticket_type_id,
            TicketTypeEvent::UnitReleased(e) => e.ticket_type_id,
        };
        if ticket_type_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "ticket_type_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            TicketTypeEvent::TicketTypeCreated(e) => {
                self.store.upsert(
                    e.ticket_type_id,
                    TicketTypeSummary {
                        ticket_type_id: e.ticket_type_id,
                        event_id: e.event_id,
                        name: e.name,
                        price: e.price,
                        total: e.total,
                        available: e.total,
                        refund_policy: e.refund_policy,
                    },
                );
            }
            TicketTypeEvent::UnitReserved(e) => {
                if let Some(mut summary) = self.store.get(&e.ticket_type_id) {
                    summary.available = summary.available.saturating_sub(1);
                    self.store.upsert(e.ticket_type_id, summary);
                }
            }
            TicketTypeEvent::UnitReleased(e) => {
                if let Some(mut summary) = self.store.get(&e.ticket_type_id) {
                    summary.available = summary.total.min(summary.available + 1);
                    self.store.upsert(e.ticket_type_id, summary);
                }
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.store.clear();

        // Deterministic replay order: aggregate, then sequence.
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
