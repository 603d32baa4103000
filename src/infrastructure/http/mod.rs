//! Multi-port HTTP ingress (§6): four logical surfaces, one process.
//! Control (9900), ticks (9901), trades (9902), logs (9903) — each its own
//! `axum::Router` bound to its own port, sharing one [`AppState`].

pub mod auth;
pub mod broker_time;
pub mod control;
pub mod logs;
pub mod response;
pub mod state;
pub mod ticks;
pub mod trades;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

fn control_router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(control::status))
        .route("/metrics", get(control::metrics))
        .route("/api/connect", post(control::connect))
        .route("/api/heartbeat", post(control::heartbeat))
        .route("/api/symbols", post(control::symbols))
        .route("/api/subscribe", post(control::subscribe))
        .route("/api/symbol_specs", post(control::symbol_specs))
        .route("/api/get_commands", post(control::get_commands))
        .route("/api/create_command", post(control::create_command))
        .route("/api/command_response", post(control::command_response))
        .route("/api/transaction", post(control::transaction))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn tick_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ticks", post(ticks::ticks))
        .route("/api/ohlc/historical", post(ticks::ohlc_historical))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn trade_router(state: AppState) -> Router {
    Router::new()
        .route("/api/trades/sync", post(trades::sync))
        .route("/api/trades/update", post(trades::update))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn log_router(state: AppState) -> Router {
    Router::new()
        .route("/api/log", post(logs::log))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds and serves all four surfaces concurrently. Returns once any one of
/// them exits (which, barring a bind failure, is never under normal
/// operation — the supervisor treats this task like any other worker).
pub async fn serve_all(state: AppState, control_port: u16, tick_port: u16, trade_port: u16, log_port: u16) -> anyhow::Result<()> {
    let surfaces: Vec<(&'static str, u16, Router)> = vec![
        ("control", control_port, control_router(state.clone())),
        ("ticks", tick_port, tick_router(state.clone())),
        ("trades", trade_port, trade_router(state.clone())),
        ("logs", log_port, log_router(state)),
    ];

    let mut handles = Vec::with_capacity(surfaces.len());
    for (name, port, router) in surfaces {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("{} surface listening on {}", name, addr);
        handles.push(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("{} surface exited: {}", name, e);
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
