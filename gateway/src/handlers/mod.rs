// =============================================================================
// Request handlers (spec §4.3, §4.7, §6 / C6)
// =============================================================================
//
// One function per `ClientRequest` variant. Most requests resolve
// synchronously against the Coordination Fabric and return an immediate
// `ServerMessage`; the handful that need the exchange worker (klines not
// already cached, quotes, accounts, server time) instead submit a `tasks`
// row and return `Outcome::Deferred` — the eventual `task.completed` /
// `task.failed` notification is what actually answers the client, via
// [`crate::data_processor::DataProcessor`].
// =============================================================================

mod alerts;
mod klines;
mod strategy;
mod sync;

use aurora_core::error::AppError;
use aurora_core::protocol::{ClientRequest, ServerMessage};
use uuid::Uuid;

use crate::app_state::AppState;

/// What a handler produced: either the full answer, or confirmation that a
/// background task now owns delivering it.
pub enum Outcome {
    Immediate(ServerMessage),
    Deferred,
}

pub async fn dispatch(
    state: &AppState,
    client_id: Uuid,
    request_id: Option<String>,
    request: ClientRequest,
) -> Result<Outcome, AppError> {
    match request {
        ClientRequest::GetConfig(_) => sync::get_config().map(Outcome::Immediate),
        ClientRequest::GetSearchSymbols(req) => sync::search_symbols(state, req).await.map(Outcome::Immediate),
        ClientRequest::GetResolveSymbol(req) => sync::resolve_symbol(state, req).await.map(Outcome::Immediate),
        ClientRequest::GetKlines(req) => klines::get_klines(state, client_id, request_id, req).await,
        ClientRequest::GetQuotes(req) => klines::get_quotes(state, client_id, request_id, req).await,
        ClientRequest::GetServerTime(_) => klines::get_server_time(state, client_id, request_id).await,
        ClientRequest::GetSpotAccount(_) => klines::get_account(state, client_id, request_id, false).await,
        ClientRequest::GetFuturesAccount(_) => klines::get_account(state, client_id, request_id, true).await,
        ClientRequest::Subscribe(req) => sync::subscribe(state, client_id, req).await.map(Outcome::Immediate),
        ClientRequest::Unsubscribe(req) => sync::unsubscribe(state, client_id, req).await.map(Outcome::Immediate),
        ClientRequest::GetSubscriptions(_) => Ok(Outcome::Immediate(sync::get_subscriptions(state, client_id))),
        ClientRequest::GetStrategyMetadata(_) => strategy::list_metadata(state).await.map(Outcome::Immediate),
        ClientRequest::GetStrategyMetadataByType(req) => {
            strategy::metadata_by_type(state, req).await.map(Outcome::Immediate)
        }
        ClientRequest::CreateAlertConfig(req) => alerts::create(state, req).await.map(Outcome::Immediate),
        ClientRequest::UpdateAlertConfig(req) => alerts::update(state, req).await.map(Outcome::Immediate),
        ClientRequest::DeleteAlertConfig(req) => alerts::delete(state, req).await.map(Outcome::Immediate),
        ClientRequest::EnableAlertConfig(req) => alerts::set_enabled(state, req, true).await.map(Outcome::Immediate),
        ClientRequest::DisableAlertConfig(req) => alerts::set_enabled(state, req, false).await.map(Outcome::Immediate),
        ClientRequest::ListAlertConfigs(_) => alerts::list(state).await.map(Outcome::Immediate),
        ClientRequest::GetAlertConfig(req) => alerts::get(state, req).await.map(Outcome::Immediate),
        ClientRequest::ListSignals(req) => alerts::list_signals(state, req).await.map(Outcome::Immediate),
    }
}
