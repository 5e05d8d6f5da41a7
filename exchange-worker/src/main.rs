// =============================================================================
// aurora-exchange-worker — binary entrypoint (spec §4.8)
// =============================================================================
//
// Three concurrent loops, same shape as the teacher's `main.rs` spawning its
// WS stream task alongside the HTTP poller:
//   1. the upstream market-data multiplexer (ws_multiplexer)
//   2. a dedicated LISTEN connection dispatching subscription.*/task.new
//      notifications to the reconciler and task handler
//   3. a periodic exchange-info refresh tick
// =============================================================================

mod db;
mod exchange_client;
mod interval_map;
mod rate_limit;
mod signing;
mod subscription_reconciler;
mod task_handler;
mod tick_handler;
mod ws_multiplexer;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use aurora_core::config::{env_string, DbConfig};
use aurora_core::envelope::{Channel, NotificationEnvelope, EXCHANGE_WORKER_CHANNELS};
use aurora_core::listener::Listener;

use exchange_client::ExchangeClient;
use signing::KeyType;
use ws_multiplexer::Multiplexer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aurora_core::config::init_tracing();

    let db_config = DbConfig::from_env()?;
    let pool = PgPoolOptions::new()
        .min_connections(db_config.pool_min_connections)
        .max_connections(db_config.pool_max_connections)
        .connect(&db_config.database_url)
        .await?;
    sqlx::migrate!("../migrations").run(&pool).await?;

    let client = Arc::new(build_exchange_client()?);
    let mux = Arc::new(Multiplexer::new(env_string("AURORA_STREAM_BASE_URL", "wss://stream.binance.com:9443")));

    let listener_pool = pool.clone();
    let listener_client = client.clone();
    let listener_mux = mux.clone();
    let database_url = db_config.database_url.clone();
    tokio::spawn(async move {
        spawn_listener_loop(database_url, listener_pool, listener_client, listener_mux).await;
    });

    let refresh_pool = pool.clone();
    let refresh_client = client.clone();
    tokio::spawn(async move {
        spawn_exchange_info_refresh_loop(refresh_pool, refresh_client).await;
    });

    let mux_for_run = mux.clone();
    let mux_pool = pool.clone();
    mux_for_run
        .run(
            move |tick| {
                let pool = mux_pool.clone();
                tokio::spawn(async move { tick_handler::handle_tick(&pool, tick).await });
            },
            {
                let pool = pool.clone();
                move || {
                    let pool = pool.clone();
                    async move {
                        match db::all_subscription_keys(&pool).await {
                            Ok(rows) => rows
                                .into_iter()
                                .filter_map(|(key, _data_type)| subscription_reconciler::stream_for_key(&key))
                                .collect(),
                            Err(e) => {
                                error!(error = %e, "failed to load subscription keys for resubscribe");
                                Vec::new()
                            }
                        }
                    }
                }
            },
        )
        .await;

    Ok(())
}

fn build_exchange_client() -> anyhow::Result<ExchangeClient> {
    let api_key = std::env::var("AURORA_EXCHANGE_API_KEY").unwrap_or_default();
    let base_url = env_string("AURORA_EXCHANGE_BASE_URL", "https://api.binance.com");

    let signing_key = match std::env::var("AURORA_EXCHANGE_SIGNING_KEY_PEM") {
        Ok(pem) => {
            let key_type = match env_string("AURORA_EXCHANGE_KEY_TYPE", "ed25519").as_str() {
                "rsa" => KeyType::RsaSha256,
                _ => KeyType::Ed25519,
            };
            Some(signing::load_key(&pem, key_type).map_err(anyhow::Error::from)?)
        }
        Err(_) => None,
    };

    Ok(ExchangeClient::new(api_key, signing_key, base_url))
}

async fn spawn_listener_loop(
    database_url: String,
    pool: sqlx::PgPool,
    client: Arc<ExchangeClient>,
    mux: Arc<Multiplexer>,
) {
    loop {
        match Listener::connect(&database_url, EXCHANGE_WORKER_CHANNELS).await {
            Ok(mut listener) => {
                info!("exchange-worker listener connected");
                loop {
                    let envelope = listener.recv().await;
                    dispatch(&pool, &client, &mux, envelope).await;
                }
            }
            Err(e) => {
                error!(error = %e, "exchange-worker listener failed to connect, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn dispatch(pool: &sqlx::PgPool, client: &ExchangeClient, mux: &Multiplexer, envelope: NotificationEnvelope) {
    match envelope.channel() {
        Some(Channel::TaskNew) => task_handler::handle(pool, client, &envelope).await,
        Some(Channel::SubscriptionAdd) | Some(Channel::SubscriptionRemove) => {
            subscription_reconciler::handle(mux, &envelope)
        }
        Some(Channel::SubscriptionClean) => {
            info!("subscription.clean received — forcing upstream reconnect");
            mux.force_reconnect();
        }
        _ => {}
    }
}

async fn spawn_exchange_info_refresh_loop(pool: sqlx::PgPool, client: Arc<ExchangeClient>) {
    let mut interval = tokio::time::interval(Duration::from_secs(3600));
    loop {
        interval.tick().await;
        if let Err(e) = task_handler::refresh_exchange_info(&pool, &client).await {
            error!(error = %e, "periodic exchange-info refresh failed");
        }
    }
}
