// =============================================================================
// aurora-signal-engine — binary entrypoint (spec §4.9)
// =============================================================================
//
// Independent process, its own listener. Bootstraps the registry and every
// enabled alert, then dispatches `realtime.update` / `alert_config.*` /
// `task.completed` / `task.failed` notifications into the engine for the
// lifetime of the process. Same bootstrap shape as the gateway's `main.rs`:
// env/tracing, shared pool, background loop.
// =============================================================================

mod admission;
mod alert_signal;
mod bar;
mod db;
mod engine;
mod fill_loop;
mod indicators;
mod interval_width;
mod kline_cache;
mod regime;
mod strategy;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use aurora_core::config::DbConfig;
use aurora_core::envelope::{Channel, NotificationEnvelope, RealtimeUpdateData, TaskCompletedData, TaskFailedData, SIGNAL_ENGINE_CHANNELS};
use aurora_core::listener::Listener;
use aurora_core::models::AlertConfigRow;

use engine::Engine;
use fill_loop::TaskOutcome;
use strategy::StrategyRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aurora_core::config::init_tracing();
    info!("aurora-signal-engine starting up");

    let db_config = DbConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .min_connections(db_config.pool_min_connections)
        .max_connections(db_config.pool_max_connections)
        .connect(&db_config.database_url)
        .await?;
    sqlx::migrate!("../migrations").run(&pool).await?;

    let engine = std::sync::Arc::new(Engine::new(pool, StrategyRegistry::with_builtins()));
    engine.bootstrap().await?;

    let database_url = db_config.database_url.clone();
    let listener_engine = engine.clone();
    tokio::spawn(async move {
        spawn_listener_loop(database_url, listener_engine).await;
    });

    // Keep the process alive; all real work happens in the spawned loop.
    std::future::pending::<()>().await;
    Ok(())
}

async fn spawn_listener_loop(database_url: String, engine: std::sync::Arc<Engine>) {
    loop {
        match Listener::connect(&database_url, SIGNAL_ENGINE_CHANNELS).await {
            Ok(mut listener) => {
                info!("signal-engine listener connected");
                loop {
                    let envelope = listener.recv().await;
                    dispatch(&engine, envelope).await;
                }
            }
            Err(e) => {
                error!(error = %e, "signal-engine listener failed to connect, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn dispatch(engine: &Engine, envelope: NotificationEnvelope) {
    match envelope.channel() {
        Some(Channel::RealtimeUpdate) => {
            if let Ok(data) = serde_json::from_value::<RealtimeUpdateData>(envelope.data) {
                engine.handle_realtime_update(data).await;
            }
        }
        Some(Channel::AlertConfigNew) => {
            if let Ok(row) = serde_json::from_value::<AlertConfigRow>(envelope.data) {
                engine.handle_alert_config_new(row).await;
            }
        }
        Some(Channel::AlertConfigUpdate) => {
            if let Ok(row) = serde_json::from_value::<AlertConfigRow>(envelope.data) {
                engine.handle_alert_config_update(row).await;
            }
        }
        Some(Channel::AlertConfigDelete) => {
            if let Ok(row) = serde_json::from_value::<AlertConfigRow>(envelope.data) {
                engine.handle_alert_config_delete(row.id).await;
            }
        }
        Some(Channel::TaskCompleted) => {
            if let Ok(data) = serde_json::from_value::<TaskCompletedData>(envelope.data) {
                engine.handle_task_outcome(TaskOutcome::Completed(data.id));
            }
        }
        Some(Channel::TaskFailed) => {
            if let Ok(data) = serde_json::from_value::<TaskFailedData>(envelope.data) {
                engine.handle_task_outcome(TaskOutcome::Failed(data.id));
            }
        }
        _ => {}
    }
}
