use std::sync::Arc;

mod config;
mod handler;
mod http;
mod logger;
mod server;
mod watch;

/// Config file looked up when no path is given (extension optional)
const DEFAULT_CONFIG_PATH: &str = "dashboard";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    // Create the Tokio runtime, sized by the workers setting when present
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_debug(&format!("Using {workers} worker threads"));
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;

    let state = Arc::new(config::AppState::new(&cfg));
    let interval = cfg.watch.poll_interval();

    // Warm the cache before the first request; failures surface on /api/status
    state.status.load().await;
    let _refresher = watch::spawn_refresher(Arc::clone(&state.status), interval);

    logger::log_server_start(&addr, &cfg.watch.path, interval);
    logger::log_debug(&format!("Serving static assets from {}", cfg.http.static_dir));

    server::run_server_loop(listener, state).await;
    Ok(())
}
