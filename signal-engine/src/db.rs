// =============================================================================
// Signal engine database access (spec §4.9, §4.4)
// =============================================================================
//
// Subscriber bookkeeping mirrors the gateway's append/remove/clear trio
// exactly (see gateway/src/db.rs) since both processes write the same
// `realtime_data.subscribers` array, just under a different label.
// =============================================================================

use aurora_core::models::{AlertConfigRow, KlineHistoryRow, StrategyMetadataRow, TaskRow};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

pub const SUBSCRIBER_LABEL: &str = aurora_core::models::source_label::SIGNAL_SERVICE;

// ---------------------------------------------------------------------------
// realtime_data — subscription bookkeeping (spec §4.4, §4.9)
// ---------------------------------------------------------------------------

pub async fn append_subscriber(pool: &PgPool, key: &str, data_type: &str) -> Result<(), sqlx::Error> {
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
    .bind(SUBSCRIBER_LABEL)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove_subscriber(pool: &PgPool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("update realtime_data set subscribers = array_remove(subscribers, $2) where subscription_key = $1")
        .bind(key)
        .bind(SUBSCRIBER_LABEL)
        .execute(pool)
        .await?;

    sqlx::query("delete from realtime_data where subscription_key = $1 and cardinality(subscribers) = 0")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Startup cleanup: drop our label from every row (a fresh process re-derives
/// its subscriptions from `alert_configs`, so any row it left behind from a
/// previous run is stale).
pub async fn clear_own_subscriber_label(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("update realtime_data set subscribers = array_remove(subscribers, $1) where $1 = any(subscribers)")
        .bind(SUBSCRIBER_LABEL)
        .execute(pool)
        .await?;

    sqlx::query("delete from realtime_data where cardinality(subscribers) = 0")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// klines_history — read path for the fill loop and startup history load
// ---------------------------------------------------------------------------

pub async fn klines_tail(pool: &PgPool, symbol: &str, interval: &str, limit: i64) -> Result<Vec<KlineHistoryRow>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, KlineHistoryRow>(
        r#"
        select symbol, interval, open_time, close_time, open, high, low, close, volume
        from klines_history
        where symbol = $1 and interval = $2
        order by open_time desc
        limit $3
        "#,
    )
    .bind(symbol)
    .bind(interval)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows)
}

// ---------------------------------------------------------------------------
// tasks — the fill loop's backfill path (spec §4.9 step "on failure")
// ---------------------------------------------------------------------------

pub async fn insert_get_klines_task(pool: &PgPool, symbol: &str, interval: &str, limit: u32) -> Result<i64, sqlx::Error> {
    let payload = serde_json::json!({ "symbol": symbol, "interval": interval, "limit": limit });
    let row: (i64,) = sqlx::query_as("insert into tasks (task_type, payload) values ($1, $2) returning id")
        .bind(aurora_core::models::task_type::GET_KLINES)
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
// alert_configs — startup load (single-row reads happen via the notification
// payload itself, which already carries the full row)
// ---------------------------------------------------------------------------

pub async fn list_enabled_alert_configs(pool: &PgPool) -> Result<Vec<AlertConfigRow>, sqlx::Error> {
    sqlx::query_as::<_, AlertConfigRow>("select * from alert_configs where enabled order by created_at asc")
        .fetch_all(pool)
        .await
}

/// Auto-disable on `once_only` firing. Goes through the same `enabled`
/// column the UI's enable/disable toggle uses, which is what makes the
/// resulting `alert_config.update` notification collapse to the in-place
/// path (spec §4.9 "solely `is_enabled` changed") instead of a rebuild.
pub async fn disable_alert_config(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("update alert_configs set enabled = false, updated_at = now() where id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// strategy_signals — the one write the signal engine performs on every
// non-none evaluation (spec §4.9 "persist + notify")
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
pub async fn insert_signal(
    pool: &PgPool,
    alert_id: Uuid,
    strategy_type: &str,
    symbol: &str,
    interval: &str,
    trigger_type: &str,
    signal: &str,
    reason: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        insert into strategy_signals (alert_id, strategy_type, symbol, interval, trigger_type, signal, reason)
        values ($1, $2, $3, $4, $5, $6, $7)
        returning id
        "#,
    )
    .bind(alert_id)
    .bind(strategy_type)
    .bind(symbol)
    .bind(interval)
    .bind(trigger_type)
    .bind(signal)
    .bind(reason)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

// ---------------------------------------------------------------------------
// alert_strategy_metadata — registry descriptors published at startup so the
// gateway's strategy-list endpoint reflects what this process can evaluate
// ---------------------------------------------------------------------------

pub async fn upsert_strategy_metadata(pool: &PgPool, row: &StrategyMetadataRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        insert into alert_strategy_metadata (strategy_type, name, description, params_schema)
        values ($1, $2, $3, $4)
        on conflict (strategy_type) do update
            set name = excluded.name, description = excluded.description, params_schema = excluded.params_schema
        "#,
    )
    .bind(&row.strategy_type)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.params_schema)
    .execute(pool)
    .await?;
    Ok(())
}
