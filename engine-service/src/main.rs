//! tickmatch engine service: a multi-symbol limit-order matching engine
//! served over a single WebSocket endpoint.
//!
//! Clients send JSON text frames (order add/cancel, book queries) to
//! `/ws`; the engine answers each request on the same connection and
//! broadcasts executed trades to every connected session.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::get,
    Router,
};
use std::time::{Duration, Instant};
use std::{env, process, sync::Arc};
use tracing::{error, info};

mod engine;
mod handler;
mod protocol;
mod websocket;

use engine::Engine;

const DEFAULT_PORT: u16 = 8080;
const STATUS_INTERVAL: Duration = Duration::from_secs(30);

/// State shared by every session handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let port = match env::args().nth(1) {
        None => DEFAULT_PORT,
        Some(arg) => match arg.parse() {
            Ok(port) => port,
            Err(_) => {
                error!("invalid port argument: {arg}");
                process::exit(2);
            }
        },
    };

    let engine = Arc::new(Engine::new());

    // Periodic status report in the log.
    let status_engine = engine.clone();
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(STATUS_INTERVAL);
        ticker.tick().await; // the first tick fires immediately
        loop {
            ticker.tick().await;
            status_engine.log_status(started.elapsed()).await;
        }
    });

    let app = Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(AppState { engine });

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind port {port}: {err}");
            process::exit(1);
        }
    };
    info!("matching engine listening on ws://0.0.0.0:{port}/ws");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {err}");
        process::exit(1);
    }
    info!("shutdown complete");
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| websocket::handle_session(socket, state))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to install shutdown handler: {err}");
        return;
    }
    info!("shutdown signal received");
}
