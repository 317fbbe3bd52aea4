//! Tally API
//!
//! Multi-tenant authentication, team management and usage metering over
//! HTTP.
//!
//! ## REST Endpoints
//!
//! - `POST /api/v1/auth/login` - Exchange credentials for a token
//! - `POST /api/v1/auth/refresh` - Re-issue a token from current state
//! - `GET /api/v1/auth/me` - Identity and tenant of the caller
//! - `POST|DELETE /api/v1/auth/deactivation` - Request or cancel deactivation
//! - `GET /api/v1/team/members` - List team members
//! - `PUT /api/v1/team/members/{id}/role` - Change a member's role
//! - `DELETE /api/v1/team/members/{id}` - Remove a member
//! - `GET|POST /api/v1/team/invitations` - List or create invitations
//! - `DELETE /api/v1/team/invitations/{id}` - Cancel an invitation
//! - `POST /api/v1/team/invitations/accept` - Redeem an invitation token
//! - `GET /api/v1/usage` - Current-period usage against plan limits
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

mod config;
mod handlers;
mod maintenance;
mod routes;
mod state;

use std::net::SocketAddr;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tally_billing_core::{UsageAccountant, UsageRecorder};
use tally_db::{Repositories, Stores};

use crate::config::{Config, LogFormat};
use crate::maintenance::Maintenance;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format)?;

    tracing::info!(
        port = config.port,
        issuer = %config.auth.issuer,
        usage_workers = config.billing.usage_workers,
        "Starting Tally API"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Database
    let pool = tally_db::create_pool(&config.database_url).await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database pool created and migrations applied");

    let stores: Stores = Repositories::new(pool.clone()).into();

    // Usage queue
    let (recorder, recorder_handle) =
        UsageRecorder::spawn(UsageAccountant::new(&stores), &config.billing);

    let port = config.port;
    let maintenance_interval = config.maintenance_interval;
    let state = AppState::new(&stores, pool, recorder, config)?;

    // Maintenance sweep
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let maintenance = Maintenance::new(
        state.quota.clone(),
        state.usage.clone(),
        state.accounts.clone(),
        state.team.clone(),
    )
    .spawn(maintenance_interval, shutdown_rx);

    let app = routes::build_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Dropping the router closed the usage queue; workers drain what is left
    let _ = shutdown_tx.send(true);
    if let Err(e) = maintenance.await {
        tracing::warn!(error = %e, "Maintenance task did not stop cleanly");
    }
    recorder_handle.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("tally_api=debug".parse()?);

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "tally_quota_denied_total",
        "Resource creations denied by plan limits, by resource"
    );
    metrics::describe_counter!(
        "tally_usage_enqueued_total",
        "Usage updates accepted by the usage queue"
    );
    metrics::describe_counter!(
        "tally_usage_dropped_total",
        "Usage updates dropped because the queue was full or closed"
    );
    metrics::describe_counter!(
        "tally_usage_failed_total",
        "Usage updates that failed to apply"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
