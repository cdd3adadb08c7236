use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use gatepass_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance. All appends run
/// under one write lock, which is what makes `append_atomic` a serialized
/// transaction across streams.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AggregateId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Validate a single-stream batch: non-empty batches must target exactly
    /// one aggregate with a consistent aggregate type.
    fn validate_batch(batch: &StreamAppend) -> Result<(AggregateId, String), EventStoreError> {
        let aggregate_id = batch.events[0].aggregate_id;
        let aggregate_type = batch.events[0].aggregate_type.clone();

        for (idx, e) in batch.events.iter().enumerate() {
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        Ok((aggregate_id, aggregate_type))
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.append_atomic(vec![StreamAppend {
            events,
            expected_version,
        }])
    }

    fn append_atomic(
        &self,
        batches: Vec<StreamAppend>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batches: Vec<StreamAppend> = batches.into_iter().filter(|b| !b.events.is_empty()).collect();
        if batches.is_empty() {
            return Ok(vec![]);
        }

        // Pre-validate batch shapes before taking the lock.
        let mut seen = HashSet::new();
        let mut keys = Vec::with_capacity(batches.len());
        for batch in &batches {
            let (aggregate_id, aggregate_type) = Self::validate_batch(batch)?;
            if !seen.insert(aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "atomic append targets stream {aggregate_id} twice"
                )));
            }
            keys.push((aggregate_id, aggregate_type));
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        // Phase 1: check every stream before touching any of them.
        for (batch, (aggregate_id, aggregate_type)) in batches.iter().zip(&keys) {
            let stream = streams.get(aggregate_id).map(Vec::as_slice).unwrap_or(&[]);
            let current = Self::current_version(stream);

            if !batch.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency(format!(
                    "stream {aggregate_id}: expected {:?}, found {current}",
                    batch.expected_version
                )));
            }

            // Enforce aggregate type stability across the stream.
            if let Some(existing) = stream.first() {
                if existing.aggregate_type != *aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, aggregate_type
                    )));
                }
            }
        }

        // Phase 2: all checks passed; assign sequence numbers and append.
        let mut committed = Vec::new();
        for (batch, (aggregate_id, _)) in batches.into_iter().zip(&keys) {
            let stream = streams.entry(*aggregate_id).or_default();
            let mut next = Self::current_version(stream) + 1;

            for e in batch.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn uncommitted(aggregate_id: AggregateId, aggregate_type: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: "test.happened".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({"n": 1}),
        }
    }

    #[test]
    fn append_assigns_monotonic_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let first = store
            .append(vec![uncommitted(id, "test")], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(first[0].sequence_number, 1);

        let second = store
            .append(
                vec![uncommitted(id, "test"), uncommitted(id, "test")],
                ExpectedVersion::Exact(1),
            )
            .unwrap();
        assert_eq!(second[0].sequence_number, 2);
        assert_eq!(second[1].sequence_number, 3);
    }

    #[test]
    fn stale_expected_version_is_a_concurrency_error() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        store
            .append(vec![uncommitted(id, "test")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![uncommitted(id, "test")], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn atomic_append_commits_all_streams_together() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        let committed = store
            .append_atomic(vec![
                StreamAppend {
                    events: vec![uncommitted(a, "alpha")],
                    expected_version: ExpectedVersion::Exact(0),
                },
                StreamAppend {
                    events: vec![uncommitted(b, "beta")],
                    expected_version: ExpectedVersion::Exact(0),
                },
            ])
            .unwrap();

        assert_eq!(committed.len(), 2);
        assert_eq!(store.load_stream(a).unwrap().len(), 1);
        assert_eq!(store.load_stream(b).unwrap().len(), 1);
    }

    #[test]
    fn atomic_append_applies_nothing_when_any_stream_is_stale() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store
            .append(vec![uncommitted(b, "beta")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append_atomic(vec![
                StreamAppend {
                    events: vec![uncommitted(a, "alpha")],
                    expected_version: ExpectedVersion::Exact(0),
                },
                StreamAppend {
                    // Stale: stream b is already at version 1.
                    events: vec![uncommitted(b, "beta")],
                    expected_version: ExpectedVersion::Exact(0),
                },
            ])
            .unwrap_err();

        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert!(store.load_stream(a).unwrap().is_empty());
        assert_eq!(store.load_stream(b).unwrap().len(), 1);
    }

    #[test]
    fn atomic_append_rejects_duplicate_streams() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();

        let err = store
            .append_atomic(vec![
                StreamAppend {
                    events: vec![uncommitted(a, "alpha")],
                    expected_version: ExpectedVersion::Exact(0),
                },
                StreamAppend {
                    events: vec![uncommitted(a, "alpha")],
                    expected_version: ExpectedVersion::Exact(0),
                },
            ])
            .unwrap_err();

        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
        assert!(store.load_stream(a).unwrap().is_empty());
    }

    #[test]
    fn aggregate_type_is_stable_per_stream() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        store
            .append(vec![uncommitted(id, "alpha")], ExpectedVersion::Exact(0))
            .unwrap();

        let err = store
            .append(vec![uncommitted(id, "beta")], ExpectedVersion::Exact(1))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }
}
