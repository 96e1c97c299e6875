use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatepass::api::middleware::session::{create_session_layer, AppState};
use gatepass::config::Config;
use gatepass::db;
use gatepass::jobs::sync_runner;
use gatepass::services::email::EmailClient;
use gatepass::services::offline_queue::OfflineQueue;
use gatepass::services::sync::{PgRemote, SyncReconciler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatepass=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting gatepass server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Open the local durable store and the offline action queue
    let local = db::create_local_store(&config.queue_path).await?;
    let queue = OfflineQueue::open(local).await?;
    tracing::info!(path = %config.queue_path, "Offline queue opened");

    // Create session layer
    let session_layer = create_session_layer(pool.clone(), &config.base_url).await?;
    tracing::info!("Session layer initialized");

    // Sync reconciler over the remote store
    let reconciler = Arc::new(SyncReconciler::new(
        queue.clone(),
        PgRemote::new(pool.clone()),
        config.sync_max_attempts,
        config.sync_backoff_base_secs,
    ));

    // Email provider client (optional)
    let email = EmailClient::from_config(&config);
    if email.is_none() {
        tracing::warn!("No email provider configured; delivery will be logged as failed");
    }

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        email,
        queue: queue.clone(),
        reconciler: reconciler.clone(),
    };

    // Schedule the periodic sync cycle
    let scheduler = JobScheduler::new().await?;
    let job_reconciler = reconciler.clone();
    scheduler
        .add(Job::new_repeated_async(
            Duration::from_secs(config.sync_interval_secs),
            move |_id, _scheduler| {
                let reconciler = job_reconciler.clone();
                Box::pin(async move {
                    sync_runner::run_sync_cycle(&reconciler).await;
                })
            },
        )?)
        .await?;
    scheduler.start().await?;
    tracing::info!(
        interval_secs = config.sync_interval_secs,
        "Sync scheduler started"
    );

    // Build router
    let app = Router::new()
        .merge(gatepass::api::health::router())
        .merge(gatepass::api::auth::router())
        .merge(gatepass::api::events::router())
        .merge(gatepass::api::attendees::router())
        .merge(gatepass::api::registrations::router())
        .merge(gatepass::api::scans::router())
        .merge(gatepass::api::sync::router())
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, cleaning up...");
}
