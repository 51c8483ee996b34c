//! Atomic optimistic-concurrency append of an event batch.

use std::collections::BTreeSet;

use annals_core::error::StoreError;
use annals_core::event::{Event, resolve_previous_sequence};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgStatement;
use sqlx::{Executor, PgConnection, PgPool, Row, Statement};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::query::to_sequence;

/// Conditional insert of one event.
///
/// `input_event` computes the current maximum sequence of the target stream
/// next to the bound values. A row is projected into the insert only when the
/// check is disabled or the claimed previous sequence equals that maximum
/// (0 standing for "no events yet"), so a conflict inserts nothing and
/// returns no row. The new event takes the next sequence of its stream.
///
/// Parameters: `$1` event type, `$2` aggregate type, `$3` aggregate id,
/// `$4` aggregate version, `$5` creation date (NULL for now), `$6` payload,
/// `$7` editor user, `$8` editor service, `$9` resource owner,
/// `$10` previous sequence, `$11` check previous.
pub const INSERT_EVENT: &str = r"
WITH input_event AS (
    SELECT
        $1::TEXT AS event_type,
        $2::TEXT AS aggregate_type,
        $3::TEXT AS aggregate_id,
        $4::TEXT AS aggregate_version,
        COALESCE($5::TIMESTAMPTZ, NOW()) AS creation_date,
        $6::JSONB AS event_data,
        $7::TEXT AS editor_user,
        $8::TEXT AS editor_service,
        $9::TEXT AS resource_owner,
        $10::BIGINT AS previous_sequence,
        $11::BOOLEAN AS check_previous,
        MAX(event_sequence) AS max_event_seq
    FROM eventstore.events
    WHERE aggregate_type = $2::TEXT
      AND aggregate_id = $3::TEXT
)
INSERT INTO eventstore.events (
    event_sequence,
    event_type,
    aggregate_type,
    aggregate_id,
    aggregate_version,
    creation_date,
    event_data,
    editor_user,
    editor_service,
    resource_owner,
    previous_sequence
)
SELECT
    COALESCE(max_event_seq, 0) + 1,
    event_type,
    aggregate_type,
    aggregate_id,
    aggregate_version,
    creation_date,
    event_data,
    editor_user,
    editor_service,
    resource_owner,
    CASE WHEN check_previous THEN previous_sequence ELSE NULL END
FROM input_event
WHERE 1 = CASE
    WHEN NOT check_previous THEN 1
    WHEN COALESCE(max_event_seq, 0) = previous_sequence THEN 1
    ELSE 0
END
RETURNING id, event_sequence, previous_sequence, creation_date
";

/// Transaction-scoped lock on one stream, keyed by `$1` aggregate type and
/// `$2` aggregate id. Released on commit or rollback.
pub const LOCK_STREAM: &str =
    "SELECT pg_advisory_xact_lock(hashtextextended($1::TEXT || '/' || $2::TEXT, 0))";

/// Pushes `events` inside one transaction.
///
/// Every stream the batch touches is locked first, in a fixed order, so
/// appenders to the same stream queue up instead of racing for the next
/// sequence. An unchecked append then always succeeds and a stale checked
/// append fails the conditional insert.
///
/// A PostgreSQL connection executes one statement at a time, so the events
/// are inserted sequentially in batch order; the first failure rolls the
/// whole transaction back and is returned. Dropping the returned future drops
/// the transaction, which also rolls back.
///
/// # Errors
///
/// Returns `StoreError::PreconditionFailed` for link or concurrency
/// violations, `StoreError::Internal` for backend failures.
pub async fn push_events(pool: &PgPool, events: &mut [Event]) -> Result<(), StoreError> {
    if events.is_empty() {
        return Ok(());
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| StoreError::internal("APPEND-BEGIN", "unable to begin transaction", e))?;

    if let Err(err) = append_batch(&mut *tx, events).await {
        if let Err(rollback) = tx.rollback().await {
            warn!(error = %rollback, "rollback failed");
        }
        return Err(err);
    }

    tx.commit()
        .await
        .map_err(|e| StoreError::internal("APPEND-COMMIT", "unable to store events", e))?;

    debug!(count = events.len(), "events pushed");
    Ok(())
}

async fn append_batch(conn: &mut PgConnection, events: &mut [Event]) -> Result<(), StoreError> {
    let statement = match (&mut *conn).prepare(INSERT_EVENT).await {
        Ok(statement) => statement,
        Err(e) => {
            warn!(error = %e, "prepare failed");
            return Err(StoreError::internal("APPEND-PREPARE", "prepare failed", e));
        }
    };

    lock_streams(conn, events).await?;

    for index in 0..events.len() {
        insert_event(conn, &statement, events, index).await?;
    }
    Ok(())
}

/// Locks each distinct stream of the batch in sorted order, so two batches
/// spanning the same streams cannot deadlock on each other.
async fn lock_streams(conn: &mut PgConnection, events: &[Event]) -> Result<(), StoreError> {
    let streams: BTreeSet<(&str, &str)> = events
        .iter()
        .map(|event| (event.aggregate_type.as_str(), event.aggregate_id.as_str()))
        .collect();

    for (aggregate_type, aggregate_id) in streams {
        sqlx::query(LOCK_STREAM)
            .bind(aggregate_type)
            .bind(aggregate_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                info!(aggregate_type, aggregate_id, error = %e, "stream lock failed");
                StoreError::internal("APPEND-LOCK", "unable to lock stream", e)
            })?;
    }
    Ok(())
}

async fn insert_event(
    conn: &mut PgConnection,
    statement: &PgStatement<'_>,
    batch: &mut [Event],
    index: usize,
) -> Result<(), StoreError> {
    let previous_sequence = resolve_previous_sequence(batch, index)?;
    let event = &mut batch[index];
    let claimed = i64::try_from(previous_sequence).map_err(|_| {
        StoreError::precondition_failed(
            "APPEND-CONFLICT",
            format!("previous sequence {previous_sequence} is out of range"),
        )
    })?;

    let result = statement
        .query()
        .bind(event.event_type.clone())
        .bind(event.aggregate_type.clone())
        .bind(event.aggregate_id.clone())
        .bind(event.version.clone())
        .bind(event.creation_date)
        .bind(event.data.clone())
        .bind(event.editor_user.clone())
        .bind(event.editor_service.clone())
        .bind(event.resource_owner.clone())
        .bind(claimed)
        .bind(event.check_previous_sequence)
        .fetch_optional(&mut *conn)
        .await;

    let row = match result {
        Ok(Some(row)) => row,
        Ok(None) => {
            return Err(StoreError::precondition_failed(
                "APPEND-CONFLICT",
                format!(
                    "{}/{} is no longer at sequence {previous_sequence}",
                    event.aggregate_type, event.aggregate_id
                ),
            ));
        }
        Err(e) => {
            info!(
                aggregate_type = %event.aggregate_type,
                aggregate_id = %event.aggregate_id,
                event_type = %event.event_type,
                error = %e,
                "insert event failed"
            );
            return Err(StoreError::internal(
                "APPEND-INSERT",
                "unable to create event",
                e,
            ));
        }
    };

    let id: Uuid = row.try_get("id").map_err(scan_error)?;
    let sequence: i64 = row.try_get("event_sequence").map_err(scan_error)?;
    let stored_previous: Option<i64> = row.try_get("previous_sequence").map_err(scan_error)?;
    let creation_date: DateTime<Utc> = row.try_get("creation_date").map_err(scan_error)?;

    event.id = Some(id);
    event.sequence = to_sequence(sequence)?;
    event.previous_sequence = stored_previous.map(to_sequence).transpose()?.unwrap_or(0);
    event.creation_date = Some(creation_date);
    Ok(())
}

fn scan_error(err: sqlx::Error) -> StoreError {
    StoreError::internal("APPEND-SCAN", "unable to read inserted event", err)
}
