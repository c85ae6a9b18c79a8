//! Provisioning service entry point.

use std::process::ExitCode;
use std::sync::Arc;

use orchestrator::ProvisioningDispatcher;
use provisiond::config::{LogFormat, ServiceConfig};
use provisiond::error::StartupError;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &ServiceConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run(config: ServiceConfig) -> Result<(), StartupError> {
    // 1. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| StartupError::Metrics(e.to_string()))?;

    // 2. Database
    let pool = provisiond::connect_database(&config).await?;

    // 3. Orchestrator and worker pool
    let orchestrator = Arc::new(provisiond::build_orchestrator(pool.clone(), &config)?);
    let dispatcher = Arc::new(ProvisioningDispatcher::start(orchestrator, config.dispatcher));

    // 4. Pending sweeper
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let sweeper_handle = config.sweep_interval.map(|interval| {
        let sweeper = Arc::new(provisiond::build_sweeper(pool.clone(), dispatcher.clone()));
        tokio::spawn(sweeper.run(interval, shutdown_tx.subscribe()))
    });

    // 5. Serve
    let app = provisiond::create_app(dispatcher.clone(), metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting provisioning service");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 6. Drain: stop relaunching, then let queued runs finish
    let _ = shutdown_tx.send(());
    if let Some(handle) = sweeper_handle
        && let Err(e) = handle.await
    {
        tracing::error!(error = %e, "pending sweeper ended abnormally");
    }
    dispatcher.shutdown().await;
    pool.close().await;

    tracing::info!("provisioning service shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("provisiond: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "provisiond failed");
            ExitCode::FAILURE
        }
    }
}
