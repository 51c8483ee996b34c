//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use sqlx::{Connection, PgPool};
use tracing::info;

use annals_core::error::StoreError;
use annals_core::event::Event;
use annals_core::repository::EventRepository;
use annals_core::search::{Columns, SearchQuery};

use crate::dialect::{Dialect, PostgresDialect};
use crate::push::push_events;
use crate::query::{Decoded, build_query};

/// PostgreSQL-backed event repository.
///
/// Pushes run in their own transaction; filters read committed data through
/// independent pool connections.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
    dialect: PostgresDialect,
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            dialect: PostgresDialect,
        }
    }

    async fn query(&self, query: &SearchQuery, columns: Columns) -> Result<Decoded, StoreError> {
        if query.columns != columns {
            return Err(StoreError::invalid_argument(
                "QUERY-COLUMNS",
                "query columns do not match the operation",
            ));
        }
        let plan = build_query(&self.dialect, query)?;
        let sql = self.dialect.placeholder(&plan.sql);

        let mut statement = sqlx::query(&sql);
        for value in plan.values {
            statement = value.bind(statement);
        }

        let rows = statement.fetch_all(&self.pool).await.map_err(|e| {
            info!(error = %e, "query failed");
            StoreError::internal("QUERY-EXEC", "unable to filter events", e)
        })?;

        plan.decoder.decode(&rows)
    }
}

fn unexpected_rows() -> StoreError {
    StoreError::Internal {
        code: "QUERY-DECODE",
        message: "decoded rows do not match the query columns".to_string(),
        source: None,
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn push(&self, events: &mut [Event]) -> Result<(), StoreError> {
        push_events(&self.pool, events).await
    }

    async fn filter(&self, query: &SearchQuery) -> Result<Vec<Event>, StoreError> {
        match self.query(query, Columns::Events).await? {
            Decoded::Events(events) => Ok(events),
            Decoded::MaxSequence(_) => Err(unexpected_rows()),
        }
    }

    async fn latest_sequence(&self, query: &SearchQuery) -> Result<u64, StoreError> {
        match self.query(query, Columns::MaxSequence).await? {
            Decoded::MaxSequence(sequence) => Ok(sequence),
            Decoded::Events(_) => Err(unexpected_rows()),
        }
    }

    /// Checks one pool connection for liveness with a single round trip.
    ///
    /// With `test_before_acquire` set (the sqlx default) acquiring already
    /// pings an idle connection or opens a fresh one, so no second ping is
    /// sent. Pools built without it get an explicit ping.
    async fn health(&self) -> Result<(), StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::internal("HEALTH-ACQUIRE", "no connection available", e))?;
        if self.pool.options().get_test_before_acquire() {
            return Ok(());
        }
        conn.ping()
            .await
            .map_err(|e| StoreError::internal("HEALTH-PING", "ping failed", e))
    }
}
