//! minectl-server — REST server for mine site personnel control.
//!
//! Configuration is read from the environment, see [`minectl_server::config`].

use std::sync::Arc;

use minectl_core::{ControlService, SystemClock};
use minectl_postgres::{connect, pg_stores, run_migrations};
use minectl_server::config::ServerConfig;
use minectl_server::router::build_router;
use minectl_server::scheduler::ShiftResetScheduler;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,minectl_server=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    let pool = connect(&config.database).await?;
    tracing::info!("Connected to database");

    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    let clock = Arc::new(SystemClock::new(config.site_offset));
    let service = Arc::new(ControlService::new(pg_stores(pool), clock));

    // Primary reset trigger; request handlers never depend on it having run.
    let scheduler = ShiftResetScheduler::new(service.reconciler(), config.reset_interval);
    tokio::spawn(async move {
        scheduler.run().await;
    });
    tracing::info!(
        "ShiftResetScheduler spawned (interval={:?}, reset_on_request={})",
        config.reset_interval,
        config.reset_on_request
    );

    let app = build_router(service, config.reset_on_request);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("minectl-server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
