// Server module entry point
// Accept loop, connection handling, listener setup and shutdown signals

pub mod connection;
pub mod listener;
pub mod signal;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::AppState;
use crate::logger;

// Re-export commonly used types
pub use listener::create_reusable_listener;
pub use signal::{start_signal_handler, Shutdown};

/// Interval at which active connections are polled while draining
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Accept connections until `shutdown` fires, then drain in-flight ones.
///
/// Draining is bounded by `write_timeout`; connections still open
/// after it are abandoned when the runtime stops.
pub async fn run(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Shutdown>,
) -> std::io::Result<()> {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        connection::accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
            () = shutdown.wait() => break,
        }
    }

    drop(listener);
    logger::log_shutdown(active_connections.load(Ordering::SeqCst));

    let drain_timeout = Duration::from_secs(state.config.performance.write_timeout);
    let deadline = tokio::time::Instant::now() + drain_timeout;

    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            tracing::info!("All connections closed");
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Drain timeout after {}s, abandoning {remaining} connection(s)",
                drain_timeout.as_secs()
            ));
            break;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }

    Ok(())
}
