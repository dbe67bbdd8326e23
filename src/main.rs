use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use clubhouse_broadcast_service::config::Settings;
use clubhouse_broadcast_service::directory::create_directory;
use clubhouse_broadcast_service::postgres::PostgresPool;
use clubhouse_broadcast_service::providers::{
    EmailTransport, HttpPushClient, PushClient, SmtpEmailTransport,
};
use clubhouse_broadcast_service::server::{create_app, AppState};
use clubhouse_broadcast_service::shutdown::GracefulShutdown;
use clubhouse_broadcast_service::tasks::ConfirmationWorker;
use clubhouse_broadcast_service::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (console + optional OTLP)
    let _telemetry_guard = telemetry::init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Recipient directory backend
    let postgres_pool = if settings.database.backend == "postgres" {
        let pool = PostgresPool::new(&settings.database).await?;
        tracing::info!(url = %pool.database_url_masked(), "Connected to PostgreSQL");
        Some(Arc::new(pool))
    } else {
        None
    };
    let directory = create_directory(&settings.database, postgres_pool);

    // Provider clients, constructed once and injected
    let push_client: Arc<dyn PushClient> = Arc::new(HttpPushClient::new(&settings.push)?);
    let email_transport: Arc<dyn EmailTransport> =
        Arc::new(SmtpEmailTransport::new(&settings.email)?);

    // Create application state
    let state = AppState::new(settings.clone(), directory, push_client, email_transport);
    tracing::info!("Application state initialized");

    // Shutdown signal for background tasks
    let (shutdown_tx, _) = broadcast::channel(1);

    // Start the confirmation worker in background
    let worker = ConfirmationWorker::new(
        state.orchestrator.clone(),
        Duration::from_secs(settings.broadcast.confirm_poll_interval_seconds),
        shutdown_tx.subscribe(),
    );
    let worker_handle = tokio::spawn(async move {
        worker.run().await;
    });

    // Create Axum app
    let app = create_app(state.clone());

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Signal background tasks and drain pending confirmations
    let shutdown = GracefulShutdown::new(state.confirmation_queue.clone(), shutdown_tx);
    shutdown.execute("server stopping").await;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(worker_handle);

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install signal handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
