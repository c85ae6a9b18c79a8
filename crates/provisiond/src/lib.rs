//! Provisioning service.
//!
//! Hosts the worker pool that executes provisioning runs, the sweeper that
//! relaunches subjects whose launch was lost, and the operational endpoints
//! (`/health`, `/metrics`). Triggers reach the pool through
//! [`ProvisioningLauncher`](orchestrator::ProvisioningLauncher).

pub mod config;
pub mod error;
pub mod routes;
pub mod sweeper;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use domain::{PostgresDirectory, PostgresSubjectStore};
use event_log::PostgresEventLog;
use metrics_exporter_prometheus::PrometheusHandle;
use orchestrator::{Orchestrator, ProvisioningDispatcher};
use providers::{HostingerRegistrar, WhmProvisioner};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

use config::ServiceConfig;
use error::StartupError;
use routes::metrics::MetricsState;
use sweeper::PendingSweeper;

/// The orchestrator wired to PostgreSQL and the live providers.
pub type LiveOrchestrator = Orchestrator<
    PostgresEventLog,
    PostgresSubjectStore,
    PostgresDirectory,
    HostingerRegistrar,
    WhmProvisioner,
>;

pub type LiveSweeper = PendingSweeper<PostgresEventLog, PostgresSubjectStore>;

/// Creates the Axum application router.
pub fn create_app(
    dispatcher: Arc<ProvisioningDispatcher>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(MetricsState {
            handle: metrics_handle,
            dispatcher: dispatcher.clone(),
        });

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(dispatcher)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}

/// Connects to the database and applies pending migrations.
pub async fn connect_database(config: &ServiceConfig) -> Result<PgPool, StartupError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    tracing::info!("database connection pool created");

    PostgresEventLog::new(pool.clone()).run_migrations().await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}

/// Builds the orchestrator over `pool` and the configured providers.
pub fn build_orchestrator(
    pool: PgPool,
    config: &ServiceConfig,
) -> Result<LiveOrchestrator, StartupError> {
    let registrar = HostingerRegistrar::new(config.registrar.clone()).map_err(|source| {
        StartupError::ProviderClient {
            provider: "hostinger",
            source,
        }
    })?;
    let hosting = WhmProvisioner::new(config.hosting_panel.clone()).map_err(|source| {
        StartupError::ProviderClient {
            provider: "whm",
            source,
        }
    })?;

    Ok(Orchestrator::new(
        PostgresEventLog::new(pool.clone()),
        PostgresSubjectStore::new(pool.clone()),
        PostgresDirectory::new(pool, config.default_plan.clone()),
        registrar,
        hosting,
        config.orchestrator.clone(),
    ))
}

/// Builds the sweeper that relaunches lost subjects through `dispatcher`.
pub fn build_sweeper(pool: PgPool, dispatcher: Arc<ProvisioningDispatcher>) -> LiveSweeper {
    PendingSweeper::new(
        PostgresEventLog::new(pool.clone()),
        PostgresSubjectStore::new(pool),
        dispatcher,
    )
}
