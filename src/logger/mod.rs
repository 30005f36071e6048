//! Logger module
//!
//! Provides logging utilities for the server including:
//! - `tracing` subscriber setup from the configured level
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Error and warning logging

mod format;

pub use format::AccessLogEntry;

use crate::config::{Config, DataSourceKind, LoggingConfig};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target used for access log events, so they can be filtered separately
pub const ACCESS_TARGET: &str = "access";

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`. Should be called once at startup.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!("Listening on: http://{addr}");
    tracing::info!(
        data_source = %config.storage.data_source,
        max_range_bytes = config.limits.max_range_bytes,
        chunk_size = config.limits.chunk_size,
        "Serving layers from /fgb/{{layer}}.fgb"
    );
    match config.storage.data_source {
        DataSourceKind::Remote => tracing::info!(
            bucket = config.storage.bucket_name.as_deref().unwrap_or_default(),
            region = %config.storage.region,
            "Remote object store"
        ),
        DataSourceKind::Local => {
            tracing::info!(root = %config.storage.root_path.display(), "Local data directory");
        }
    }
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(max) = config.performance.max_connections {
        tracing::info!("Max connections: {max}");
    }
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

pub fn log_shutdown(active_connections: usize) {
    tracing::info!(active_connections, "Shutdown requested, no longer accepting connections");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: ACCESS_TARGET, "{}", entry.format(format));
}
