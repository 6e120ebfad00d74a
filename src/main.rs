//! Traffic Sentry server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use traffic_sentry::config::{Config, LogFormat, StoreBackend};
use traffic_sentry::logic::sinks::{MemoryStore, PersistenceSink, PgStore};
use traffic_sentry::{create_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "traffic_sentry=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match LogFormat::from_env() {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    // Load configuration; invalid values are reported now that logging is up
    let config = Config::from_env();

    tracing::info!("Traffic Sentry starting...");
    tracing::info!(
        environment = %config.environment,
        source = %config.traffic_source,
        log_format = ?config.log_format,
        "Configuration loaded"
    );

    let store: Arc<dyn PersistenceSink> = match config.store_backend {
        StoreBackend::Postgres => {
            tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));

            let pool = db::create_pool(&config.database_url, config.database_max_connections)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Running database migrations...");
            db::run_migrations(&pool).await.context("Failed to run migrations")?;

            Arc::new(PgStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, records are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(config.clone(), store);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
