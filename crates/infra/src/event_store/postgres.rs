//! Postgres-backed event store (behind the `postgres` feature).
//!
//! Optimistic concurrency is enforced twice: the stream version is checked
//! inside the transaction, and the unique constraint on
//! `(aggregate_id, sequence_number)` catches a concurrent append that
//! slips between the check and the insert (`23505` → `Concurrency`).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use gatepass_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

/// Postgres-backed append-only event store.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the events table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), EventStoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                event_id UUID PRIMARY KEY,
                aggregate_id UUID NOT NULL,
                aggregate_type TEXT NOT NULL,
                sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
                event_type TEXT NOT NULL,
                event_version INT NOT NULL,
                occurred_at TIMESTAMPTZ NOT NULL,
                payload JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (aggregate_id, sequence_number)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }

    pub async fn load_stream_async(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                event_id,
                aggregate_id,
                aggregate_type,
                sequence_number,
                event_type,
                event_version,
                occurred_at,
                payload
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        rows.iter().map(row_to_stored).collect()
    }

    pub async fn append_atomic_async(
        &self,
        batches: Vec<StreamAppend>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batches: Vec<StreamAppend> =
            batches.into_iter().filter(|b| !b.events.is_empty()).collect();
        if batches.is_empty() {
            return Ok(vec![]);
        }

        // Validate batch shapes before opening the transaction.
        let mut seen = HashSet::new();
        for batch in &batches {
            let aggregate_id = batch.events[0].aggregate_id;
            let aggregate_type = &batch.events[0].aggregate_type;
            for (idx, e) in batch.events.iter().enumerate() {
                if e.aggregate_id != aggregate_id {
                    return Err(EventStoreError::InvalidAppend(format!(
                        "batch contains multiple aggregate_ids (index {idx})"
                    )));
                }
                if e.aggregate_type != *aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "batch contains multiple aggregate_types (index {idx})"
                    )));
                }
            }
            if !seen.insert(aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "atomic append targets stream {aggregate_id} twice"
                )));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let mut committed = Vec::new();
        for batch in batches {
            let aggregate_id = batch.events[0].aggregate_id;

            let current: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(sequence_number), 0) FROM events WHERE aggregate_id = $1",
            )
            .bind(aggregate_id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("version_check", e))?;
            let current = current as u64;

            if !batch.expected_version.matches(current) {
                // Dropping the transaction rolls back everything staged so far.
                return Err(EventStoreError::Concurrency(format!(
                    "stream {aggregate_id}: expected {:?}, found {current}",
                    batch.expected_version
                )));
            }

            let mut next = current + 1;
            for e in batch.events {
                let stored = stored_from(e, next);
                sqlx::query(
                    r#"
                    INSERT INTO events (
                        event_id, aggregate_id, aggregate_type, sequence_number,
                        event_type, event_version, occurred_at, payload
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(stored.event_id)
                .bind(stored.aggregate_id.as_uuid())
                .bind(&stored.aggregate_type)
                .bind(stored.sequence_number as i64)
                .bind(&stored.event_type)
                .bind(stored.event_version as i32)
                .bind(stored.occurred_at)
                .bind(&stored.payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("append", e))?;

                next += 1;
                committed.push(stored);
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(committed)
    }
}

impl EventStore for PostgresEventStore {
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
        block_on(self.append_atomic_async(batches))
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        block_on(self.load_stream_async(aggregate_id))
    }
}

/// Bridge the sync `EventStore` trait onto the async pool.
///
/// Requires a multi-threaded tokio runtime (the API binary runs one).
fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
}

fn stored_from(e: UncommittedEvent, sequence_number: u64) -> StoredEvent {
    StoredEvent {
        event_id: e.event_id,
        aggregate_id: e.aggregate_id,
        aggregate_type: e.aggregate_type,
        sequence_number,
        event_type: e.event_type,
        event_version: e.event_version,
        occurred_at: e.occurred_at,
        payload: e.payload,
    }
}

fn row_to_stored(row: &sqlx::postgres::PgRow) -> Result<StoredEvent, EventStoreError> {
    let decode = |e: sqlx::Error| EventStoreError::InvalidAppend(format!("row decode: {e}"));

    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(decode)?,
        aggregate_id: AggregateId::from_uuid(row.try_get("aggregate_id").map_err(decode)?),
        aggregate_type: row.try_get("aggregate_type").map_err(decode)?,
        sequence_number: row.try_get::<i64, _>("sequence_number").map_err(decode)? as u64,
        event_type: row.try_get("event_type").map_err(decode)?,
        event_version: row.try_get::<i32, _>("event_version").map_err(decode)? as u32,
        occurred_at: row
            .try_get::<DateTime<Utc>, _>("occurred_at")
            .map_err(decode)?,
        payload: row.try_get("payload").map_err(decode)?,
    })
}

fn map_sqlx_error(op: &str, err: sqlx::Error) -> EventStoreError {
    if let sqlx::Error::Database(db) = &err {
        // 23505: unique violation on (aggregate_id, sequence_number).
        if db.code().as_deref() == Some("23505") {
            return EventStoreError::Concurrency(format!("{op}: concurrent append detected"));
        }
    }
    EventStoreError::InvalidAppend(format!("{op}: {err}"))
}
