use std::sync::Arc;

use fgbserve::config::{self, AppState};
use fgbserve::{logger, server, source};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Optional config path as first argument, e.g. `fgbserve /etc/fgbserve/config.toml`
    let cfg = match std::env::args().nth(1) {
        Some(path) => config::Config::load_from(&path)?,
        None => config::Config::load()?,
    };
    logger::init(&cfg.logging)?;

    // Worker threads follow `server.workers`, defaulting to CPU cores
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = cfg.get_socket_addr()?;

    // Fail fast: an unreachable bucket or missing data directory aborts startup
    let data_source = source::from_config(&cfg.storage).await.map_err(|e| {
        logger::log_error(&format!("Failed to initialise data source: {e}"));
        e
    })?;

    let listener = server::create_reusable_listener(addr)?;
    let state = Arc::new(AppState::new(cfg, data_source));

    let shutdown = Arc::new(server::Shutdown::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;

    logger::log_server_start(&addr, &state.config);
    server::run(listener, state, shutdown).await?;
    Ok(())
}
