// =============================================================================
// Exchange worker database access (spec §4.8)
// =============================================================================
//
// Mirrors the shape of the gateway's `db.rs` — small focused functions, one
// per statement, using `sqlx::query`/`query_as` directly rather than a query
// builder. The exchange worker only ever writes `realtime_data`, archives
// into `klines_history`, replaces `exchange_info`, upserts `account_info`,
// and transitions `tasks`.
// =============================================================================

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use aurora_core::models::ExchangeInfoRow;

// ---------------------------------------------------------------------------
// realtime_data — tick writes and resubscribe bootstrap
// ---------------------------------------------------------------------------

/// Write one inbound tick. The `archive_closed_kline` trigger handles
/// fan-out into `klines_history` on closed bars; this is the only write the
/// worker issues per tick.
pub async fn write_tick(
    pool: &PgPool,
    key: &str,
    data_type: &str,
    data: Value,
    event_time: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        update realtime_data
        set data = $2, event_time = $3, updated_at = now()
        where subscription_key = $1 and data_type = $4
        "#,
    )
    .bind(key)
    .bind(data)
    .bind(event_time)
    .bind(data_type)
    .execute(pool)
    .await?;
    Ok(())
}

/// Every currently-subscribed key the worker is responsible for, used to
/// rebuild the upstream subscription set after a reconnect or a
/// `subscription.clean` broadcast.
pub async fn all_subscription_keys(pool: &PgPool) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as("select subscription_key, data_type from realtime_data")
        .fetch_all(pool)
        .await
}

// ---------------------------------------------------------------------------
// tasks — processing lifecycle (spec §4.3, §4.8)
// ---------------------------------------------------------------------------

/// Claim a pending task. Conditional on `status = 'pending'` so two workers
/// racing the same `task.new` notification can't both pick it up.
pub async fn claim_task(pool: &PgPool, task_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "update tasks set status = 'processing', updated_at = now() where id = $1 and status = 'pending'",
    )
    .bind(task_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn complete_task(pool: &PgPool, task_id: i64, result: Option<Value>) -> Result<(), sqlx::Error> {
    sqlx::query("update tasks set status = 'completed', result = $2, updated_at = now() where id = $1")
        .bind(task_id)
        .bind(result)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fail_task(pool: &PgPool, task_id: i64, reason: Value) -> Result<(), sqlx::Error> {
    sqlx::query("update tasks set status = 'failed', result = $2, updated_at = now() where id = $1")
        .bind(task_id)
        .bind(reason)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// klines_history — bulk upsert for the GET_KLINES task path
// ---------------------------------------------------------------------------

pub async fn upsert_klines(pool: &PgPool, symbol: &str, interval: &str, bars: &[KlineBar]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for bar in bars {
        sqlx::query(
            r#"
            insert into klines_history (symbol, interval, open_time, close_time, open, high, low, close, volume)
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            on conflict (symbol, interval, open_time) do update set
                close_time = excluded.close_time,
                open = excluded.open,
                high = excluded.high,
                low = excluded.low,
                close = excluded.close,
                volume = excluded.volume
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .bind(bar.open_time)
        .bind(bar.close_time)
        .bind(bar.open)
        .bind(bar.high)
        .bind(bar.low)
        .bind(bar.close)
        .bind(bar.volume)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub struct KlineBar {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

// ---------------------------------------------------------------------------
// exchange_info — full-replacement refresh (spec §4.8 "exchange-info refresh")
// ---------------------------------------------------------------------------

/// Delete every row for `market_type` and bulk-insert the fresh snapshot in
/// the same transaction, so readers never observe a partially-replaced
/// table.
pub async fn replace_exchange_info(pool: &PgPool, market_type: &str, rows: &[ExchangeInfoRow]) -> Result<(), sqlx::Error> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

    sqlx::query("delete from exchange_info where market_type = $1")
        .bind(market_type)
        .execute(&mut *tx)
        .await?;

    for row in rows {
        sqlx::query(
            r#"
            insert into exchange_info (exchange, market_type, symbol, base_asset, quote_asset, status, filters)
            values ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&row.exchange)
        .bind(&row.market_type)
        .bind(&row.symbol)
        .bind(&row.base_asset)
        .bind(&row.quote_asset)
        .bind(&row.status)
        .bind(&row.filters)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// account_info — snapshot used by the gateway's cached account read path
// ---------------------------------------------------------------------------

pub async fn upsert_account_info(pool: &PgPool, account_type: &str, balances: Value) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        insert into account_info (account_type, balances, updated_at)
        values ($1, $2, now())
        on conflict (account_type) do update set balances = excluded.balances, updated_at = now()
        "#,
    )
    .bind(account_type)
    .bind(balances)
    .execute(pool)
    .await?;
    Ok(())
}
