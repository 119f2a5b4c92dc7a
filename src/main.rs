//! user_registry - Event-sourced user management service
//!
//! Commands append events to an append-only log and maintain a
//! current-state row; a checkpointed sync engine folds the log into a
//! denormalized user projection for reads.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use user_registry::api::{self, AppState};
use user_registry::bus::EventBus;
use user_registry::event_store::EventStore;
use user_registry::projection::{CheckpointStore, ProjectionStore, SyncEngine};
use user_registry::Config;

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_registry=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting user_registry service");
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    // Verify database schema
    if !user_registry::db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let bus = EventBus::new();
    let event_store = EventStore::new(pool.clone());
    let projections = ProjectionStore::new(pool.clone());
    let checkpoints = CheckpointStore::new(pool.clone());

    let sync_engine = Arc::new(SyncEngine::new(
        event_store,
        projections.clone(),
        checkpoints,
        config.sync_batch_size,
        config.sync_interval,
    ));

    // Startup catch-up is fatal on failure: the service must not serve
    // reads from a stale projection.
    sync_engine.init().await?;

    // Fast path: committed events nudge the engine immediately; the
    // periodic loop covers anything the bus drops.
    let mut events = bus.subscribe();
    let nudge_engine = Arc::clone(&sync_engine);
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(_) => {
                    if let Err(e) = nudge_engine.catch_up().await {
                        tracing::error!(error = %e, "Fast-path sync run failed");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event bus lagged, periodic sync will repair");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Periodic catch-up loop
    let _sync_task = Arc::clone(&sync_engine).start();

    let state = AppState {
        pool: pool.clone(),
        projections,
        sync_engine,
    };

    let app = api::create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
