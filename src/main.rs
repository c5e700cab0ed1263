//! Mini APC - A shared in-memory key/value cache engine
//!
//! Hosts a cache instance with its background TTL sweep and reports usage
//! until shutdown.

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_apc::{Cache, Config};

/// Main entry point for the Mini APC cache host.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache engine
/// 4. Start background TTL cleanup task
/// 5. Log a usage summary every cleanup interval
/// 6. On SIGINT/SIGTERM print the final cache and allocator reports
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_apc=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini APC cache engine");

    let config = Config::from_env();
    info!(
        "Configuration loaded: capacity={} segment_size={} max_segments={} shards={} cleanup_interval={}s",
        config.capacity,
        config.segment_size,
        config.max_segments(),
        config.shard_count,
        config.cleanup_interval
    );

    let cache = Cache::new(config.clone()).context("failed to initialize cache engine")?;
    info!("Cache engine enabled: {}", cache.enabled());

    let cleanup_handle = cache.spawn_sweeper();
    info!("Background cleanup task started");

    let mut ticker = tokio::time::interval(Duration::from_secs(config.cleanup_interval.max(1)));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let info = cache.cache_info(true);
                let sma = cache.sma_info(true);
                info!(
                    "entries={} hits={} misses={} used_bytes={} avail_mem={} segments={}",
                    info.num_entries, info.num_hits, info.num_misses,
                    sma.used_bytes, sma.avail_mem, sma.num_seg
                );
            }
            _ = &mut shutdown => break,
        }
    }

    cleanup_handle.abort();
    warn!("Cleanup task aborted");

    let report = serde_json::json!({
        "cache_info": cache.cache_info(true),
        "sma_info": cache.sma_info(true),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
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
}
