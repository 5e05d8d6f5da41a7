// =============================================================================
// Gateway database access — every query the gateway issues against the
// Coordination Fabric (spec §3, §4.3, §4.4)
// =============================================================================

use aurora_core::models::{AlertConfigRow, KlineHistoryRow, StrategyMetadataRow, StrategySignalRow, TaskRow};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// realtime_data — subscription bookkeeping (spec §4.4)
// ---------------------------------------------------------------------------

/// Upsert-with-array-append: create the row if absent, or append `label` to
/// its `subscribers` array if it isn't already present. This is the write
/// that fires `subscription.add` on a fresh INSERT.
pub async fn append_subscriber(
    pool: &PgPool,
    key: &str,
    data_type: &str,
    label: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        insert into realtime_data (subscription_key, data_type, subscribers)
        values ($1, $2, array[$3])
        on conflict (subscription_key) do update
            set subscribers = case
                when $3 = any(realtime_data.subscribers) then realtime_data.subscribers
                else array_append(realtime_data.subscribers, $3)
            end
        "#,
    )
    .bind(key)
    .bind(data_type)
    .bind(label)
    .execute(pool)
    .await?;
    Ok(())
}

/// Remove `label` from a row's `subscribers`; delete the row entirely once
/// the array becomes empty (fires `subscription.remove`).
pub async fn remove_subscriber(pool: &PgPool, key: &str, label: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        update realtime_data
        set subscribers = array_remove(subscribers, $2)
        where subscription_key = $1
        "#,
    )
    .bind(key)
    .bind(label)
    .execute(pool)
    .await?;

    sqlx::query(
        "delete from realtime_data where subscription_key = $1 and cardinality(subscribers) = 0",
    )
    .bind(key)
    .execute(pool)
    .await?;
    Ok(())
}

/// Startup cleanup (spec §4.4): drop `label` from every row, deleting rows
/// left with zero subscribers. Returns the number of rows touched.
pub async fn clear_own_subscriber_label(pool: &PgPool, label: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        update realtime_data
        set subscribers = array_remove(subscribers, $1)
        where $1 = any(subscribers)
        "#,
    )
    .bind(label)
    .execute(pool)
    .await?;

    sqlx::query("delete from realtime_data where cardinality(subscribers) = 0")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Gateway-issued `subscription.clean` NOTIFY — there is no table write that
/// naturally fires this one, so the gateway emits it directly.
pub async fn notify_subscription_clean(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"select pg_notify('subscription.clean', json_build_object(
            'event_id', uuid_generate_v4(),
            'event_type', 'subscription.clean',
            'timestamp', now(),
            'data', json_build_object('action', 'clean_all')
        )::text)"#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// tasks — async RPC path (spec §4.3)
// ---------------------------------------------------------------------------

pub async fn insert_task(pool: &PgPool, task_type: &str, payload: Value) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "insert into tasks (task_type, payload) values ($1, $2) returning id",
    )
    .bind(task_type)
    .bind(payload)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn get_task(pool: &PgPool, task_id: i64) -> Result<Option<TaskRow>, sqlx::Error> {
    sqlx::query_as::<_, TaskRow>("select * from tasks where id = $1")
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

// ---------------------------------------------------------------------------
// klines_history — cache-first path (spec §4.3 path 2)
// ---------------------------------------------------------------------------

/// True if a bar exists at exactly `open_time` for (symbol, interval).
pub async fn kline_endpoint_exists(
    pool: &PgPool,
    symbol: &str,
    interval: &str,
    open_time: i64,
) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        "select exists(select 1 from klines_history where symbol = $1 and interval = $2 and open_time = $3)",
    )
    .bind(symbol)
    .bind(interval)
    .bind(open_time)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

pub async fn klines_range(
    pool: &PgPool,
    symbol: &str,
    interval: &str,
    from_time: i64,
    to_time: i64,
) -> Result<Vec<KlineHistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, KlineHistoryRow>(
        r#"
        select symbol, interval, open_time, close_time, open, high, low, close, volume
        from klines_history
        where symbol = $1 and interval = $2 and open_time >= $3 and open_time <= $4
        order by open_time asc
        "#,
    )
    .bind(symbol)
    .bind(interval)
    .bind(from_time)
    .bind(to_time)
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// account_info (spec §4.7 "result=null" account responses)
// ---------------------------------------------------------------------------

pub async fn account_balances(pool: &PgPool, account_type: &str) -> Result<Option<Value>, sqlx::Error> {
    let row: Option<(Value,)> = sqlx::query_as(
        "select balances from account_info where account_type = $1",
    )
    .bind(account_type)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

// ---------------------------------------------------------------------------
// exchange_info — search / resolve (spec §4.3 path 1)
// ---------------------------------------------------------------------------

pub async fn search_symbols(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<Value>, sqlx::Error> {
    let pattern = format!("%{}%", query.to_uppercase());
    let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
        r#"
        select exchange, market_type, symbol, base_asset, quote_asset
        from exchange_info
        where symbol like $1
        order by symbol asc
        limit $2
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(exchange, market_type, symbol, base_asset, quote_asset)| {
            serde_json::json!({
                "exchange": exchange,
                "marketType": market_type,
                "symbol": symbol,
                "baseAsset": base_asset,
                "quoteAsset": quote_asset,
            })
        })
        .collect())
}

pub async fn resolve_symbol(pool: &PgPool, symbol: &str) -> Result<Option<Value>, sqlx::Error> {
    let row: Option<(String, String, String, String, String, String, Value)> = sqlx::query_as(
        "select exchange, market_type, symbol, base_asset, quote_asset, status, filters from exchange_info where symbol = $1 limit 1",
    )
    .bind(symbol.to_uppercase())
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(exchange, market_type, symbol, base_asset, quote_asset, status, filters)| {
            serde_json::json!({
                "exchange": exchange,
                "marketType": market_type,
                "symbol": symbol,
                "baseAsset": base_asset,
                "quoteAsset": quote_asset,
                "status": status,
                "filters": filters,
            })
        },
    ))
}

// ---------------------------------------------------------------------------
// alert_configs — CRUD on behalf of the UI (spec §3 "Alert Config")
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
pub async fn create_alert_config(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    strategy_type: &str,
    symbol: &str,
    interval: &str,
    trigger_type: &str,
    params: Value,
    owner: Option<&str>,
) -> Result<AlertConfigRow, sqlx::Error> {
    sqlx::query_as::<_, AlertConfigRow>(
        r#"
        insert into alert_configs (name, description, strategy_type, symbol, interval, trigger_type, params, owner)
        values ($1, $2, $3, $4, $5, $6, $7, $8)
        returning *
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(strategy_type)
    .bind(symbol)
    .bind(interval)
    .bind(trigger_type)
    .bind(params)
    .bind(owner)
    .fetch_one(pool)
    .await
}

pub async fn get_alert_config(pool: &PgPool, id: Uuid) -> Result<Option<AlertConfigRow>, sqlx::Error> {
    sqlx::query_as::<_, AlertConfigRow>("select * from alert_configs where id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_alert_configs(pool: &PgPool) -> Result<Vec<AlertConfigRow>, sqlx::Error> {
    sqlx::query_as::<_, AlertConfigRow>("select * from alert_configs order by created_at desc")
        .fetch_all(pool)
        .await
}

pub async fn delete_alert_config(pool: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("delete from alert_configs where id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn set_alert_enabled(pool: &PgPool, id: Uuid, enabled: bool) -> Result<Option<AlertConfigRow>, sqlx::Error> {
    sqlx::query_as::<_, AlertConfigRow>(
        "update alert_configs set enabled = $2, updated_at = now() where id = $1 returning *",
    )
    .bind(id)
    .bind(enabled)
    .fetch_optional(pool)
    .await
}

// ---------------------------------------------------------------------------
// strategy metadata & signals (read-only for the gateway)
// ---------------------------------------------------------------------------

pub async fn list_strategy_metadata(pool: &PgPool) -> Result<Vec<StrategyMetadataRow>, sqlx::Error> {
    sqlx::query_as::<_, StrategyMetadataRow>("select * from alert_strategy_metadata order by strategy_type")
        .fetch_all(pool)
        .await
}

pub async fn strategy_metadata_by_type(
    pool: &PgPool,
    strategy_type: &str,
) -> Result<Option<StrategyMetadataRow>, sqlx::Error> {
    sqlx::query_as::<_, StrategyMetadataRow>("select * from alert_strategy_metadata where strategy_type = $1")
        .bind(strategy_type)
        .fetch_optional(pool)
        .await
}

pub async fn list_signals(
    pool: &PgPool,
    alert_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<StrategySignalRow>, sqlx::Error> {
    match alert_id {
        Some(id) => {
            sqlx::query_as::<_, StrategySignalRow>(
                "select * from strategy_signals where alert_id = $1 order by computed_at desc limit $2",
            )
            .bind(id)
            .bind(limit)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as::<_, StrategySignalRow>(
                "select * from strategy_signals order by computed_at desc limit $1",
            )
            .bind(limit)
            .fetch_all(pool)
            .await
        }
    }
}
