use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tokio::sync::Notify;

mod app;
mod config;
mod handler;
mod http;
mod logger;
mod routing;
mod server;
mod session;
mod templates;

use routing::Value;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = match std::env::args().nth(1) {
        Some(config_path) => config::Config::load_from(&config_path)?,
        None => config::Config::load()?,
    };
    logger::init(&cfg)?;

    // Build the Tokio runtime with the configured number of worker threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("[CONFIG] Using {workers} worker threads"));
    } else {
        logger::log_info("[CONFIG] Using default worker threads (CPU cores)");
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let state = Arc::new(app::build_state(cfg)?);

    for route in state.routes.iter() {
        logger::log_route(
            route.name(),
            &routing::allow_header(route.methods()),
            route.pattern().as_str(),
        );
    }
    log_reverse_lookups(&state.routes);

    let listener = server::create_listener(addr, server::DEFAULT_BACKLOG)?;
    logger::log_server_start(&addr, &state.config, state.routes.len());

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;

    // hyper connections are served with spawn_local
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            state,
            Arc::new(AtomicUsize::new(0)),
            shutdown,
        ))
        .await;
    Ok(())
}

/// Show how a few named routes reverse into concrete URLs
fn log_reverse_lookups(routes: &routing::RouteTable<handler::Handler>) {
    let demos: [(&str, Vec<(&str, Value)>); 4] = [
        ("login", vec![]),
        ("hello", vec![]),
        (
            "show_PI",
            vec![("PInum", Value::Float(3.141_516_7)), ("next", Value::from("/"))],
        ),
        ("show_user", vec![("userName", Value::from("John Doe"))]),
    ];
    for (name, params) in demos {
        match routes.reverse(name, &params) {
            Ok(url) => logger::log_info(&format!("[url_for] {name} -> {url}")),
            Err(e) => logger::log_warning(&format!("[url_for] {name}: {e}")),
        }
    }
}
