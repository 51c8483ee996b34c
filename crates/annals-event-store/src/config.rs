//! Store configuration read from the environment.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::SetupError;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connection settings for [`PgEventRepository`](crate::pg_event_repository::PgEventRepository).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// PostgreSQL connection string (`DATABASE_URL`).
    pub database_url: String,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`, default 10).
    pub max_connections: u32,
}

impl StoreConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Config` if `DATABASE_URL` is unset or
    /// `DATABASE_MAX_CONNECTIONS` is not a positive integer.
    pub fn from_env() -> Result<Self, SetupError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`StoreConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SetupError> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            SetupError::Config("DATABASE_URL environment variable must be set".to_string())
        })?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) => {
                    return Err(SetupError::Config(
                        "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
                    ));
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(SetupError::Config(format!(
                        "DATABASE_MAX_CONNECTIONS must be a valid u32: {e}"
                    )));
                }
            },
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }

    /// Creates the connection pool.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Database` if the initial connection fails.
    pub async fn connect(&self) -> Result<PgPool, SetupError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await?;
        Ok(pool)
    }
}
