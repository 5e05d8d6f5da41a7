// =============================================================================
// Task handling — `task.new` → venue REST call → `tasks` transition (spec §4.8)
// =============================================================================
//
// Payload shapes mirror exactly what the gateway's `handlers::klines` submits
// (see gateway/src/handlers/klines.rs): `get_klines` carries
// symbol/interval/fromTime/toTime/limit, `get_quotes` carries symbols, the
// rest carry an empty object.
// =============================================================================

use aurora_core::envelope::{Channel, NotificationEnvelope, TaskNewData};
use aurora_core::models::task_type;
use tracing::{error, info, warn};

use crate::db::{self, KlineBar};
use crate::exchange_client::ExchangeClient;
use crate::interval_map;

pub async fn handle(pool: &sqlx::PgPool, client: &ExchangeClient, envelope: &NotificationEnvelope) {
    if envelope.channel() != Some(Channel::TaskNew) {
        return;
    }
    let Ok(task) = serde_json::from_value::<TaskNewData>(envelope.data.clone()) else {
        warn!("malformed task.new payload, dropping");
        return;
    };

    match db::claim_task(pool, task.id).await {
        Ok(true) => {}
        Ok(false) => {
            info!(task_id = task.id, "task already claimed by another worker, skipping");
            return;
        }
        Err(e) => {
            error!(error = %e, task_id = task.id, "failed to claim task");
            return;
        }
    }

    let outcome = run_task(pool, client, &task).await;
    match outcome {
        Ok(result) => {
            if let Err(e) = db::complete_task(pool, task.id, result).await {
                error!(error = %e, task_id = task.id, "failed to mark task completed");
            }
        }
        Err(reason) => {
            warn!(task_id = task.id, task_type = %task.task_type, %reason, "task failed");
            if let Err(e) = db::fail_task(pool, task.id, serde_json::json!({ "error": reason })).await {
                error!(error = %e, task_id = task.id, "failed to mark task failed");
            }
        }
    }
}

async fn run_task(
    pool: &sqlx::PgPool,
    client: &ExchangeClient,
    task: &TaskNewData,
) -> Result<Option<serde_json::Value>, String> {
    match task.task_type.as_str() {
        t if t == task_type::GET_KLINES => get_klines(pool, client, &task.payload).await,
        t if t == task_type::GET_QUOTES => get_quotes(client, &task.payload).await,
        t if t == task_type::GET_SERVER_TIME => get_server_time(client).await,
        t if t == task_type::GET_SPOT_ACCOUNT => get_account(pool, client, "SPOT").await,
        t if t == task_type::GET_FUTURES_ACCOUNT => get_account(pool, client, "FUTURES").await,
        t if t == task_type::FETCH_EXCHANGE_INFO => fetch_exchange_info(pool, client).await,
        other => Err(format!("unknown task type: {other}")),
    }
}

/// Backfills `klines_history` directly; the task itself completes with a
/// null result since the gateway re-reads the cache rather than the task row.
async fn get_klines(pool: &sqlx::PgPool, client: &ExchangeClient, payload: &serde_json::Value) -> Result<Option<serde_json::Value>, String> {
    let symbol = payload["symbol"].as_str().ok_or("missing symbol")?;
    let interval = payload["interval"].as_str().ok_or("missing interval")?;
    let limit = payload["limit"].as_u64().unwrap_or(1000).min(1000) as u32;

    let venue_interval = interval_map::to_venue_interval(interval).ok_or("unsupported interval")?;
    let bars = client.get_klines(symbol, venue_interval, limit).await.map_err(|e| e.to_string())?;

    let parsed: Vec<KlineBar> = bars
        .iter()
        .filter_map(|b| parse_rest_kline(b))
        .collect();

    db::upsert_klines(pool, symbol, interval, &parsed).await.map_err(|e| e.to_string())?;
    Ok(None)
}

/// Venue kline REST rows are arrays: `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn parse_rest_kline(row: &serde_json::Value) -> Option<KlineBar> {
    let arr = row.as_array()?;
    Some(KlineBar {
        open_time: arr.first()?.as_i64()?,
        close_time: arr.get(6)?.as_i64()?,
        open: arr.get(1)?.as_str()?.parse().ok()?,
        high: arr.get(2)?.as_str()?.parse().ok()?,
        low: arr.get(3)?.as_str()?.parse().ok()?,
        close: arr.get(4)?.as_str()?.parse().ok()?,
        volume: arr.get(5)?.as_str()?.parse().ok()?,
    })
}

async fn get_quotes(client: &ExchangeClient, payload: &serde_json::Value) -> Result<Option<serde_json::Value>, String> {
    let symbols: Vec<String> = serde_json::from_value(payload["symbols"].clone()).map_err(|_| "missing symbols")?;
    let result = client.get_quotes(&symbols).await.map_err(|e| e.to_string())?;
    Ok(Some(result))
}

async fn get_server_time(client: &ExchangeClient) -> Result<Option<serde_json::Value>, String> {
    let server_time = client.get_server_time().await.map_err(|e| e.to_string())?;
    Ok(Some(serde_json::json!({ "serverTime": server_time })))
}

/// Writes the snapshot to `account_info` directly; like `get_klines`, the
/// task itself completes with a null result since the gateway re-reads the
/// cache rather than the task row.
async fn get_account(pool: &sqlx::PgPool, client: &ExchangeClient, account_type: &str) -> Result<Option<serde_json::Value>, String> {
    let balances = if account_type == "FUTURES" {
        client.get_futures_account().await
    } else {
        client.get_spot_account().await
    }
    .map_err(|e| e.to_string())?;

    db::upsert_account_info(pool, account_type, balances)
        .await
        .map_err(|e| e.to_string())?;

    Ok(None)
}

async fn fetch_exchange_info(pool: &sqlx::PgPool, client: &ExchangeClient) -> Result<Option<serde_json::Value>, String> {
    refresh_exchange_info(pool, client).await?;
    Ok(None)
}

/// Shared by the `task.new` path and the periodic refresh loop in `main.rs`.
pub(crate) async fn refresh_exchange_info(pool: &sqlx::PgPool, client: &ExchangeClient) -> Result<(), String> {
    let symbols = client.fetch_exchange_info().await.map_err(|e| e.to_string())?;
    let rows: Vec<aurora_core::models::ExchangeInfoRow> = symbols
        .iter()
        .filter_map(parse_exchange_info_symbol)
        .collect();

    db::replace_exchange_info(pool, "SPOT", &rows).await.map_err(|e| e.to_string())
}

fn parse_exchange_info_symbol(raw: &serde_json::Value) -> Option<aurora_core::models::ExchangeInfoRow> {
    Some(aurora_core::models::ExchangeInfoRow {
        exchange: "BINANCE".to_string(),
        market_type: "SPOT".to_string(),
        symbol: raw.get("symbol")?.as_str()?.to_string(),
        base_asset: raw.get("baseAsset")?.as_str()?.to_string(),
        quote_asset: raw.get("quoteAsset")?.as_str()?.to_string(),
        status: raw.get("status")?.as_str()?.to_string(),
        filters: raw.get("filters").cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rest_kline_row() {
        let row = serde_json::json!([
            1700000000000i64, "42000.10", "42100.00", "41950.50", "42050.25", "12.5",
            1700000059999i64, "quote_volume", 100, "taker_base", "taker_quote", "ignore"
        ]);
        let bar = parse_rest_kline(&row).unwrap();
        assert_eq!(bar.open_time, 1700000000000);
        assert_eq!(bar.close, 42050.25);
    }

    #[test]
    fn rejects_malformed_kline_row() {
        assert!(parse_rest_kline(&serde_json::json!([1])).is_none());
    }
}
