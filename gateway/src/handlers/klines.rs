// Handlers on the async task path — either served from the klines cache
// directly, or forwarded to the exchange worker as a `tasks` row (spec §4.3
// path 2, §4.7).

use aurora_core::error::AppError;
use aurora_core::models::task_type;
use aurora_core::protocol::{GetKlinesRequest, GetQuotesRequest, KlinesData, ServerMessage};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db;
use crate::handlers::Outcome;

/// Serve from `klines_history` if both range endpoints are already cached;
/// otherwise submit a `get_klines` task and let the exchange worker backfill.
pub async fn get_klines(
    state: &AppState,
    client_id: Uuid,
    request_id: Option<String>,
    req: GetKlinesRequest,
) -> Result<Outcome, AppError> {
    if req.from_time > req.to_time {
        return Err(AppError::Validation("fromTime must not be after toTime".into()));
    }

    let has_start = db::kline_endpoint_exists(&state.pool, &req.symbol, &req.interval, req.from_time).await?;
    let has_end = db::kline_endpoint_exists(&state.pool, &req.symbol, &req.interval, req.to_time).await?;

    if has_start && has_end {
        let rows = db::klines_range(&state.pool, &req.symbol, &req.interval, req.from_time, req.to_time).await?;
        let bars: Vec<serde_json::Value> = rows.into_iter().map(|r| serde_json::to_value(r).unwrap()).collect();
        return Ok(Outcome::Immediate(ServerMessage::KlinesData(KlinesData {
            count: bars.len(),
            bars,
        })));
    }

    submit_task(
        state,
        client_id,
        request_id,
        task_type::GET_KLINES,
        serde_json::json!({
            "symbol": req.symbol,
            "interval": req.interval,
            "fromTime": req.from_time,
            "toTime": req.to_time,
            "limit": req.limit,
        }),
    )
    .await
}

pub async fn get_quotes(
    state: &AppState,
    client_id: Uuid,
    request_id: Option<String>,
    req: GetQuotesRequest,
) -> Result<Outcome, AppError> {
    if req.symbols.is_empty() {
        return Err(AppError::Validation("symbols must not be empty".into()));
    }
    submit_task(
        state,
        client_id,
        request_id,
        task_type::GET_QUOTES,
        serde_json::json!({ "symbols": req.symbols }),
    )
    .await
}

pub async fn get_server_time(state: &AppState, client_id: Uuid, request_id: Option<String>) -> Result<Outcome, AppError> {
    submit_task(state, client_id, request_id, task_type::GET_SERVER_TIME, serde_json::json!({})).await
}

pub async fn get_account(
    state: &AppState,
    client_id: Uuid,
    request_id: Option<String>,
    is_futures: bool,
) -> Result<Outcome, AppError> {
    let task_type = if is_futures {
        task_type::GET_FUTURES_ACCOUNT
    } else {
        task_type::GET_SPOT_ACCOUNT
    };
    submit_task(state, client_id, request_id, task_type, serde_json::json!({})).await
}

async fn submit_task(
    state: &AppState,
    client_id: Uuid,
    request_id: Option<String>,
    task_type: &str,
    payload: serde_json::Value,
) -> Result<Outcome, AppError> {
    let task_id = db::insert_task(&state.pool, task_type, payload).await?;
    state.tasks.track(task_id, client_id, request_id);
    Ok(Outcome::Deferred)
}
