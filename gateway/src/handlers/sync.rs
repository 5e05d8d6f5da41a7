// Handlers that answer entirely out of the Coordination Fabric, no exchange
// worker round trip needed (spec §4.3 path 1, §4.4).

use aurora_core::error::AppError;
use aurora_core::protocol::{
    GetResolveSymbolRequest, GetSearchSymbolsRequest, ServerMessage, SubscribeRequest,
};
use aurora_core::subscription_key::SubscriptionKey;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db;

pub fn get_config() -> Result<ServerMessage, AppError> {
    Ok(ServerMessage::ConfigData(serde_json::json!({
        "protocolVersion": aurora_core::protocol::PROTOCOL_VERSION,
        "supportsGroupRequest": false,
        "supportedResolutions": aurora_core::subscription_key::VALID_INTERVALS,
    })))
}

pub async fn search_symbols(state: &AppState, req: GetSearchSymbolsRequest) -> Result<ServerMessage, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::Validation("query must not be empty".into()));
    }
    let results = db::search_symbols(&state.pool, &req.query, 50).await?;
    Ok(ServerMessage::SearchSymbolsData(serde_json::json!({ "symbols": results })))
}

pub async fn resolve_symbol(state: &AppState, req: GetResolveSymbolRequest) -> Result<ServerMessage, AppError> {
    match db::resolve_symbol(&state.pool, &req.symbol).await? {
        Some(info) => Ok(ServerMessage::SymbolData(info)),
        None => Err(AppError::NotFound(format!("symbol {} not found", req.symbol))),
    }
}

/// Validate and register a set of subscription keys for `client_id`.
pub async fn subscribe(state: &AppState, client_id: Uuid, req: SubscribeRequest) -> Result<ServerMessage, AppError> {
    let mut parsed = Vec::with_capacity(req.keys.len());
    for key in &req.keys {
        let parsed_key = SubscriptionKey::parse(key)
            .ok_or_else(|| AppError::Validation(format!("malformed subscription key: {key}")))?;
        parsed.push((key.clone(), parsed_key.data_type));
    }

    let data_type_by_key: Vec<(String, String)> = parsed
        .iter()
        .map(|(key, dt)| (key.clone(), serde_json::to_value(dt).unwrap().as_str().unwrap().to_string()))
        .collect();

    state.subscriptions.subscribe(client_id, &data_type_by_key).await;
    Ok(ServerMessage::SubscriptionData(serde_json::json!({
        "subscribed": req.keys,
    })))
}

pub async fn unsubscribe(state: &AppState, client_id: Uuid, req: SubscribeRequest) -> Result<ServerMessage, AppError> {
    state.subscriptions.unsubscribe(client_id, &req.keys).await;
    Ok(ServerMessage::SubscriptionData(serde_json::json!({
        "unsubscribed": req.keys,
    })))
}

pub fn get_subscriptions(state: &AppState, client_id: Uuid) -> ServerMessage {
    let keys = state.subscriptions.keys_of(client_id);
    ServerMessage::SubscriptionData(serde_json::json!({ "keys": keys }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_config_reports_protocol_version() {
        let msg = get_config().unwrap();
        match msg {
            ServerMessage::ConfigData(v) => {
                assert_eq!(v["protocolVersion"], aurora_core::protocol::PROTOCOL_VERSION);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }
}
