//! Transient state used by the repository.
//!
//! This is initialized on startup.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info_span, Instrument};

use query_engine_execution::metrics;
use query_engine_execution::postgres::PostgresStore;
use query_engine_execution::store::Store;
use resource_sql_configuration::Configuration;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// State for our repository.
#[derive(Clone)]
pub struct State {
    pub metrics: metrics::Metrics,
    pub store: Arc<dyn Store>,
}

impl State {
    pub fn new(store: Arc<dyn Store>, metrics: metrics::Metrics) -> State {
        State { metrics, store }
    }
}

/// Create a connection pool and wrap it inside a repository State.
pub async fn create_state(
    configuration: &Configuration,
    metrics_registry: &mut prometheus::Registry,
) -> Result<State, InitializationError> {
    let pool = create_pool(configuration)
        .instrument(info_span!("Create connection pool"))
        .await?;

    let metrics = async {
        let metrics_inner = metrics::Metrics::initialize(metrics_registry)
            .map_err(InitializationError::MetricsError)?;
        metrics_inner.update_pool_metrics(&pool);
        Ok(metrics_inner)
    }
    .instrument(info_span!("Setup metrics"))
    .await?;

    Ok(State::new(Arc::new(PostgresStore::new(pool)), metrics))
}

/// Create a connection pool from the pool settings.
/// - <https://docs.rs/sqlx/latest/sqlx/pool/struct.PoolOptions.html>
async fn create_pool(configuration: &Configuration) -> Result<PgPool, InitializationError> {
    let pool_settings = &configuration.pool_settings;

    PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(pool_settings.pool_timeout))
        .idle_timeout(
            pool_settings
                .idle_timeout
                .map(std::time::Duration::from_secs),
        )
        .max_lifetime(
            pool_settings
                .connection_lifetime
                .map(std::time::Duration::from_secs),
        )
        .connect(&configuration.connection_uri)
        .await
        .map_err(InitializationError::UnableToCreatePool)
}

/// State initialization error.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("unable to initialize connection pool: {0}")]
    UnableToCreatePool(sqlx::Error),
    #[error("error initializing metrics: {0}")]
    MetricsError(prometheus::Error),
}
