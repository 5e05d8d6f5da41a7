// Strategy metadata lookups (spec §3 "Strategy Metadata") — read-only,
// populated by the signal engine's registry at its own startup.

use aurora_core::error::AppError;
use aurora_core::protocol::{GetStrategyMetadataByTypeRequest, ServerMessage};

use crate::app_state::AppState;
use crate::db;

pub async fn list_metadata(state: &AppState) -> Result<ServerMessage, AppError> {
    let rows = db::list_strategy_metadata(&state.pool).await?;
    Ok(ServerMessage::StrategyMetadataData(serde_json::json!({ "strategies": rows })))
}

pub async fn metadata_by_type(
    state: &AppState,
    req: GetStrategyMetadataByTypeRequest,
) -> Result<ServerMessage, AppError> {
    let row = db::strategy_metadata_by_type(&state.pool, &req.strategy_type)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("strategy type {} not found", req.strategy_type)))?;
    Ok(ServerMessage::StrategyMetadataData(serde_json::to_value(row)?))
}
