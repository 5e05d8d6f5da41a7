// Alert config CRUD + signal listing (spec §3 "Alert Config" / "Strategy
// Signal"). These answer directly from the Coordination Fabric; the
// `alert_config.*` triggers are what actually wake the signal engine.

use aurora_core::error::AppError;
use aurora_core::protocol::{
    AlertIdRequest, CreateAlertConfigRequest, ListSignalsRequest, ServerMessage, UpdateAlertConfigRequest,
};

use crate::app_state::AppState;
use crate::db;

pub async fn create(state: &AppState, req: CreateAlertConfigRequest) -> Result<ServerMessage, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    let row = db::create_alert_config(
        &state.pool,
        &req.name,
        req.description.as_deref(),
        &req.strategy_type,
        &req.symbol,
        &req.interval,
        &req.trigger_type,
        req.params,
        None,
    )
    .await?;
    Ok(ServerMessage::AlertConfigData(serde_json::to_value(row)?))
}

pub async fn update(state: &AppState, req: UpdateAlertConfigRequest) -> Result<ServerMessage, AppError> {
    // Partial update: fetch-modify-write rather than a dynamic SET clause,
    // matching the rest of the gateway's explicit-query style.
    let existing = db::get_alert_config(&state.pool, req.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("alert config {} not found", req.id)))?;

    let name = req.name.unwrap_or(existing.name);
    let description = req.description.or(existing.description);
    let symbol = req.symbol.unwrap_or(existing.symbol);
    let interval = req.interval.unwrap_or(existing.interval);
    let trigger_type = req.trigger_type.unwrap_or(existing.trigger_type);
    let params = req.params.unwrap_or(existing.params);

    let updated = sqlx::query_as::<_, aurora_core::models::AlertConfigRow>(
        r#"
        update alert_configs
        set name = $2, description = $3, symbol = $4, interval = $5, trigger_type = $6, params = $7,
            enabled = coalesce($8, enabled), updated_at = now()
        where id = $1
        returning *
        "#,
    )
    .bind(req.id)
    .bind(&name)
    .bind(&description)
    .bind(&symbol)
    .bind(&interval)
    .bind(&trigger_type)
    .bind(&params)
    .bind(req.enabled)
    .fetch_one(&state.pool)
    .await?;

    Ok(ServerMessage::AlertConfigData(serde_json::to_value(updated)?))
}

pub async fn delete(state: &AppState, req: AlertIdRequest) -> Result<ServerMessage, AppError> {
    let affected = db::delete_alert_config(&state.pool, req.id).await?;
    if affected == 0 {
        return Err(AppError::NotFound(format!("alert config {} not found", req.id)));
    }
    Ok(ServerMessage::AlertConfigData(serde_json::json!({ "id": req.id, "deleted": true })))
}

pub async fn set_enabled(state: &AppState, req: AlertIdRequest, enabled: bool) -> Result<ServerMessage, AppError> {
    let row = db::set_alert_enabled(&state.pool, req.id, enabled)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("alert config {} not found", req.id)))?;
    Ok(ServerMessage::AlertConfigData(serde_json::to_value(row)?))
}

pub async fn list(state: &AppState) -> Result<ServerMessage, AppError> {
    let rows = db::list_alert_configs(&state.pool).await?;
    Ok(ServerMessage::AlertConfigData(serde_json::json!({ "configs": rows })))
}

pub async fn get(state: &AppState, req: AlertIdRequest) -> Result<ServerMessage, AppError> {
    let row = db::get_alert_config(&state.pool, req.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("alert config {} not found", req.id)))?;
    Ok(ServerMessage::AlertConfigData(serde_json::to_value(row)?))
}

pub async fn list_signals(state: &AppState, req: ListSignalsRequest) -> Result<ServerMessage, AppError> {
    let limit = req.limit.unwrap_or(100).min(500) as i64;
    let rows = db::list_signals(&state.pool, req.alert_id, limit).await?;
    Ok(ServerMessage::SignalData(serde_json::json!({ "signals": rows })))
}
