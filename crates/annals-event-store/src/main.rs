//! Liveness check for the Annals event store.
//!
//! Exits successfully when the configured database answers a ping.

use annals_core::repository::EventRepository;
use annals_event_store::config::StoreConfig;
use annals_event_store::error::SetupError;
use annals_event_store::pg_event_repository::PgEventRepository;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), SetupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = StoreConfig::from_env()?;
    tracing::info!(max_connections = config.max_connections, "checking event store");

    let pool = config.connect().await?;
    let repository = PgEventRepository::new(pool);

    if let Err(e) = repository.health().await {
        tracing::error!(error = %e, "event store is unhealthy");
        return Err(SetupError::Store(e));
    }

    tracing::info!("event store is healthy");
    Ok(())
}
