use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use gatepass_catalog::{EventId, EventLifecycleEvent, EventStatus};
use gatepass_core::UserId;
use gatepass_messaging::EventEnvelope;

use super::{CursorCheck, Cursors, ProjectionError};
use crate::read_model::ReadModelStore;

/// Queryable event directory: one summary row per event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSummary {
    pub event_id: EventId,
    pub host_id: UserId,
    pub title: String,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: EventStatus,
}

/// Event directory projection.
#[derive(Debug)]
pub struct EventDirectoryProjection<S>
where
    S: ReadModelStore<EventId, EventSummary>,
{
    store: S,
    cursors: Cursors,
}

impl<S> EventDirectoryProjection<S>
where
    S: ReadModelStore<EventId, EventSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Cursors::default(),
        }
    }

    pub fn get(&self, event_id: &EventId) -> Option<EventSummary> {
        self.store.get(event_id)
    }

    pub fn list(&self) -> Vec<EventSummary> {
        self.store.list()
    }

    /// Public browse surface: live events only.
    pub fn list_live(&self) -> Vec<EventSummary> {
        self.store
            .list()
            .into_iter()
            .filter(|e| e.status == EventStatus::Live)
            .collect()
    }

    pub fn list_for_host(&self, host_id: UserId) -> Vec<EventSummary> {
        self.store
            .list()
            .into_iter()
            .filter(|e| e.host_id == host_id)
            .collect()
    }

    /// Identifiers of every event owned by a host (host-listing scope).
    pub fn host_event_ids(&self, host_id: UserId) -> HashSet<EventId> {
        self.list_for_host(host_id)
            .into_iter()
            .map(|e| e.event_id)
            .collect()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let CursorCheck::Skip = self.cursors.check(aggregate_id, seq)? {
            return Ok(());
        }

        let ev: EventLifecycleEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let event_id = match &ev {
            EventLifecycleEvent::EventSubmitted(e) => e.event_id,
            EventLifecycleEvent::EventApproved(e) => e.event_id,
            EventLifecycleEvent::EventRejected(e) => e.event_id,
        };
        if event_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            EventLifecycleEvent::EventSubmitted(e) => {
                self.store.upsert(
                    e.event_id,
                    EventSummary {
                        event_id: e.event_id,
                        host_id: e.host_id,
                        title: e.title,
                        venue: e.venue,
                        starts_at: e.starts_at,
                        ends_at: e.ends_at,
                        status: EventStatus::Pending,
                    },
                );
            }
            EventLifecycleEvent::EventApproved(e) => {
                if let Some(mut summary) = self.store.get(&e.event_id) {
                    summary.status = EventStatus::Live;
                    self.store.upsert(e.event_id, summary);
                }
            }
            EventLifecycleEvent::EventRejected(e) => {
                if let Some(mut summary) = self.store.get(&e.event_id) {
                    summary.status = EventStatus::Canceled;
                    self.store.upsert(e.event_id, summary);
                }
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }
}
