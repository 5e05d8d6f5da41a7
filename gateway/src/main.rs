// =============================================================================
// Aurora API Gateway — entry point
// =============================================================================
//
// Boots the shared Coordination Fabric pool, runs pending migrations, starts
// the notification listener loop, and serves the WebSocket + health routes.
// Mirrors the teacher's `main.rs` bootstrap order (env/tracing, shared state,
// background loops, then the server) with the trading-specific streams
// replaced by the listener and task-sweep loops this topology needs.
// =============================================================================

mod app_state;
mod client_manager;
mod data_processor;
mod db;
mod handlers;
mod health;
mod subscription_manager;
mod task_router;
mod ws_handler;

use std::sync::Arc;
use std::time::Duration;

use aurora_core::config::{DbConfig, Timeouts};
use aurora_core::envelope::GATEWAY_CHANNELS;
use aurora_core::listener::Listener;
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aurora_core::config::init_tracing();
    info!("aurora-gateway starting up");

    let db_config = DbConfig::from_env()?;
    let timeouts = Timeouts::default();

    let pool = PgPoolOptions::new()
        .min_connections(db_config.pool_min_connections)
        .max_connections(db_config.pool_max_connections)
        .connect(&db_config.database_url)
        .await?;

    sqlx::migrate!("../migrations").run(&pool).await?;

    let state = AppState::new(pool, timeouts);

    state.subscriptions.startup_cleanup().await?;

    spawn_listener_loop(state.clone(), db_config.database_url.clone());
    spawn_task_sweep_loop(state.clone());

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/healthz", get(health::health))
        .route("/ws", get(ws_handler::ws_handler))
        .layer(cors)
        .with_state(state);

    let bind_addr = aurora_core::config::env_string("AURORA_GATEWAY_BIND", "0.0.0.0:8080");
    info!(%bind_addr, "listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs for the lifetime of the process: decode every notification on the
/// gateway's channel set and hand it to the data processor.
fn spawn_listener_loop(state: Arc<AppState>, database_url: String) {
    tokio::spawn(async move {
        let mut listener = loop {
            match Listener::connect(&database_url, GATEWAY_CHANNELS).await {
                Ok(listener) => break listener,
                Err(e) => {
                    error!(error = %e, "gateway listener failed to connect, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        };
        loop {
            let envelope = listener.recv().await;
            state.processor.dispatch(envelope).await;
        }
    });
}

/// Periodically evicts tasks that never got an answer within their deadline
/// (spec §5 "Cancellation & timeouts").
fn spawn_task_sweep_loop(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(5));
        loop {
            tick.tick().await;
            for (task_id, client_id, request_id) in state.tasks.sweep_expired() {
                let message = aurora_core::protocol::wrap_outbound(
                    aurora_core::protocol::ServerMessage::Error(aurora_core::protocol::ErrorData {
                        error_code: aurora_core::protocol::ErrorCode::Timeout,
                        error_message: format!("task {task_id} timed out"),
                    }),
                    request_id,
                );
                state.clients.send_to(client_id, message);
            }
        }
    });
}
