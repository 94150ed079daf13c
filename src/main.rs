//! Indexed Disk Cache - region service
//!
//! Opens one disk region and serves it over HTTP.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use indexed_disk_cache::api::create_router;
use indexed_disk_cache::{spawn_key_save_task, AppState, DiskCacheConfig};

/// Main entry point for the region service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the region, loading and checking its key file
/// 4. Start the periodic key save task if configured
/// 5. Start HTTP server on configured port
/// 6. On SIGINT/SIGTERM stop serving and dispose the region
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indexed_disk_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Indexed Disk Cache");

    let config = DiskCacheConfig::from_env();
    info!(
        "Configuration loaded: cache_name={}, disk_path={}, max_key_size={}, \
         max_recycle_bin_size={}, optimize_at_remove_count={}, port={}",
        config.cache_name,
        config.disk_path.display(),
        config.max_key_size,
        config.max_recycle_bin_size,
        config.optimize_at_remove_count,
        config.server_port
    );

    let state = AppState::from_config(&config)
        .with_context(|| format!("failed to open disk region {}", config.cache_name))?;
    let cache = state.cache.clone();

    let key_save_handle = (config.key_save_interval_secs > 0)
        .then(|| spawn_key_save_task(cache.clone(), config.key_save_interval_secs));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(key_save_handle))
        .await
        .context("server error")?;

    info!("Disposing region {}", cache.cache_name());
    if let Err(e) = cache.dispose().await {
        error!("Dispose of {} failed: {}", cache.cache_name(), e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the key save task.
async fn shutdown_signal(key_save_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = key_save_handle {
        handle.abort();
        warn!("Key save task aborted");
    }
}
