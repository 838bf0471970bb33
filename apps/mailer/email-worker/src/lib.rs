//! Email Worker Service
//!
//! A background worker that delivers outbound email jobs from a Redis stream.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (go-email:microservice)
//!   ↓ (Consumer Group: go-email:group)
//! Worker<RedisStreamStore, EmailProcessor>
//!   ↓ (decodes to/subject/body)
//! MailtrapSender
//!   ↓
//! Email Delivery
//! ```
//!
//! A job is acknowledged only after the provider accepted it. Anything else
//! stays pending in the group.

pub mod config;

use axum::Router;
use config::Config;
use core_config::{Environment, FromEnv, app_info};
use email::EmailProcessor;
use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{
    Backoff, HealthState, RedisStreamStore, StreamStore, Worker, health_router, init_metrics,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const REDIS_CONNECT_RETRIES: u32 = 5;

/// Start the health HTTP server and serve until `shutdown` flips to true
///
/// Provides endpoints for:
/// - Liveness probes: `/health`, `/healthz`
/// - Stream monitoring: `/stream/info`
/// - Prometheus metrics: `/metrics`
async fn start_health_server(
    health_state: HealthState,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app: Router = health_router(health_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(port = %port, "Health server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Run the email worker
///
/// This is the main entry point for the worker. It:
/// 1. Loads `.env` and configuration, then sets up structured logging
/// 2. Connects to Redis with retry logic
/// 3. Bootstraps the consumer group and starts consuming
/// 4. Stops cleanly on SIGINT/SIGTERM; a second signal forces exit
///
/// # Errors
///
/// Returns an error if:
/// - Configuration is invalid
/// - Redis connection fails
/// - The consumer group cannot be created
pub async fn run() -> Result<()> {
    let env_file = core_config::load_env_file().wrap_err("Failed to load .env file")?;
    let environment = Environment::from_env();
    let config = Config::from_env().wrap_err("Failed to load configuration")?;

    core_config::tracing::init_tracing(&environment, config.log_file.as_deref())
        .wrap_err("Failed to initialize tracing")?;
    init_metrics().wrap_err("Failed to initialize metrics")?;

    match &env_file {
        Some(path) => info!(path = %path.display(), "Loaded environment file"),
        None => debug!("No .env file found, using process environment"),
    }

    let app_info = app_info!();
    info!(name = %app_info.name, version = %app_info.version, "Starting email worker service");
    info!("Environment: {:?}", environment);

    info!("Connecting to Redis...");
    let store = RedisStreamStore::connect_with_retry(
        &config.redis_url,
        config.worker.block_timeout,
        REDIS_CONNECT_RETRIES,
        Backoff::new(Duration::from_millis(500), Duration::from_secs(8)),
    )
    .await
    .wrap_err("Failed to connect to Redis")?;

    // The consumer loop parks a blocking XREADGROUP on its connection, so
    // monitoring gets its own.
    let monitor_store: Arc<dyn StreamStore> = Arc::new(
        RedisStreamStore::connect(&config.redis_url, config.worker.block_timeout)
            .await
            .wrap_err("Failed to connect to Redis for monitoring")?,
    );

    info!(
        stream = %config.worker.stream_name,
        consumer_group = %config.worker.consumer_group,
        consumer = %config.worker.consumer_name,
        batch_size = config.worker.batch_size,
        block_timeout_ms = config.worker.block_timeout.as_millis() as u64,
        recover_pending = config.worker.recover_pending_on_start,
        "Worker configuration loaded"
    );

    if config.mailtrap.api_key.is_empty() {
        warn!("MAILTRAP_API_KEY is not set; deliveries will fail and stay pending");
    }

    let processor = EmailProcessor::new(config.mail_sender()).with_send_timeout(config.send_timeout);
    let worker = Worker::new(Arc::new(store), processor, config.worker.clone());

    let health_state = HealthState::new(
        monitor_store.clone(),
        app_info.name,
        app_info.version,
        worker.config(),
    );
    let (health_shutdown_tx, health_shutdown_rx) = watch::channel(false);
    let health_port = config.health_port;
    let health_task = tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, health_port, health_shutdown_rx).await {
            error!(error = %e, "Health server failed");
        }
    });

    worker
        .start()
        .await
        .wrap_err("Failed to start email worker")?;

    shutdown_signal().await?;

    tokio::spawn(async {
        if shutdown_signal().await.is_ok() {
            error!("Second shutdown signal received, forcing exit");
            std::process::exit(1);
        }
    });

    health_shutdown_tx.send_replace(true);
    if let Err(e) = health_task.await {
        error!(error = %e, "Health server task failed");
    }

    worker.stop().await.wrap_err("Failed to stop email worker")?;
    if let Err(e) = monitor_store.close().await {
        warn!(error = %e, "Failed to close monitoring connection");
    }

    info!("Email worker service stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.wrap_err("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, initiating shutdown...");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .wrap_err("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
