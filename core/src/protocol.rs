// =============================================================================
// Wire protocol — three-phase ACK/SUCCESS/ERROR/UPDATE envelope (spec §4.6)
// =============================================================================
//
// External wire is camelCase; internal tables and envelopes are snake_case.
// We lean on serde's `rename_all = "camelCase"` to do that translation at
// the one boundary that needs it (these structs), so nothing upstream of
// the codec ever has to think about casing.
//
// `ClientRequest` is a tagged enum — one variant per inbound `type` — so the
// codec is total and exhaustive (spec §9's redesign note: dynamic typing at
// the boundary becomes tagged variants). `ServerMessage` mirrors it for the
// outbound direction.
// =============================================================================

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The raw wire shape every message — inbound or outbound — is wrapped in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub protocol_version: String,
    #[serde(flatten)]
    pub body: T,
    pub request_id: Option<String>,
    pub timestamp: Option<i64>,
}

// ---------------------------------------------------------------------------
// Inbound requests
// ---------------------------------------------------------------------------

#[derive(Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientRequest {
    GetConfig(GetConfigRequest),
    GetSearchSymbols(GetSearchSymbolsRequest),
    GetResolveSymbol(GetResolveSymbolRequest),
    GetKlines(GetKlinesRequest),
    GetQuotes(GetQuotesRequest),
    GetServerTime(EmptyRequest),
    GetSpotAccount(EmptyRequest),
    GetFuturesAccount(EmptyRequest),
    Subscribe(SubscribeRequest),
    Unsubscribe(SubscribeRequest),
    GetSubscriptions(EmptyRequest),
    GetStrategyMetadata(EmptyRequest),
    GetStrategyMetadataByType(GetStrategyMetadataByTypeRequest),
    CreateAlertConfig(CreateAlertConfigRequest),
    UpdateAlertConfig(UpdateAlertConfigRequest),
    DeleteAlertConfig(AlertIdRequest),
    EnableAlertConfig(AlertIdRequest),
    DisableAlertConfig(AlertIdRequest),
    ListAlertConfigs(EmptyRequest),
    GetAlertConfig(AlertIdRequest),
    ListSignals(ListSignalsRequest),
}

impl ClientRequest {
    /// The request `type` name, used for diagnostics and the task-router's
    /// `original request type` bookkeeping (spec §4.3).
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientRequest::GetConfig(_) => "GET_CONFIG",
            ClientRequest::GetSearchSymbols(_) => "GET_SEARCH_SYMBOLS",
            ClientRequest::GetResolveSymbol(_) => "GET_RESOLVE_SYMBOL",
            ClientRequest::GetKlines(_) => "GET_KLINES",
            ClientRequest::GetQuotes(_) => "GET_QUOTES",
            ClientRequest::GetServerTime(_) => "GET_SERVER_TIME",
            ClientRequest::GetSpotAccount(_) => "GET_SPOT_ACCOUNT",
            ClientRequest::GetFuturesAccount(_) => "GET_FUTURES_ACCOUNT",
            ClientRequest::Subscribe(_) => "SUBSCRIBE",
            ClientRequest::Unsubscribe(_) => "UNSUBSCRIBE",
            ClientRequest::GetSubscriptions(_) => "GET_SUBSCRIPTIONS",
            ClientRequest::GetStrategyMetadata(_) => "GET_STRATEGY_METADATA",
            ClientRequest::GetStrategyMetadataByType(_) => "GET_STRATEGY_METADATA_BY_TYPE",
            ClientRequest::CreateAlertConfig(_) => "CREATE_ALERT_CONFIG",
            ClientRequest::UpdateAlertConfig(_) => "UPDATE_ALERT_CONFIG",
            ClientRequest::DeleteAlertConfig(_) => "DELETE_ALERT_CONFIG",
            ClientRequest::EnableAlertConfig(_) => "ENABLE_ALERT_CONFIG",
            ClientRequest::DisableAlertConfig(_) => "DISABLE_ALERT_CONFIG",
            ClientRequest::ListAlertConfigs(_) => "LIST_ALERT_CONFIGS",
            ClientRequest::GetAlertConfig(_) => "GET_ALERT_CONFIG",
            ClientRequest::ListSignals(_) => "LIST_SIGNALS",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmptyRequest {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConfigRequest {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSearchSymbolsRequest {
    pub query: String,
    #[serde(default)]
    pub exchange: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResolveSymbolRequest {
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetKlinesRequest {
    pub symbol: String,
    pub interval: String,
    pub from_time: i64,
    pub to_time: i64,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQuotesRequest {
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStrategyMetadataByTypeRequest {
    pub strategy_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertConfigRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub strategy_type: String,
    pub symbol: String,
    pub interval: String,
    pub trigger_type: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertConfigRequest {
    pub id: uuid::Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub interval: Option<String>,
    #[serde(default)]
    pub trigger_type: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertIdRequest {
    pub id: uuid::Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSignalsRequest {
    #[serde(default)]
    pub alert_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Outbound responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Ack,
    Error(ErrorData),
    Update(UpdateData),
    ConfigData(serde_json::Value),
    KlinesData(KlinesData),
    QuotesData(serde_json::Value),
    SymbolData(serde_json::Value),
    SearchSymbolsData(serde_json::Value),
    SubscriptionData(serde_json::Value),
    AccountData(serde_json::Value),
    StrategyMetadataData(serde_json::Value),
    AlertConfigData(serde_json::Value),
    SignalData(serde_json::Value),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorData {
    pub error_code: ErrorCode,
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateData {
    pub subscription_key: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KlinesData {
    pub bars: Vec<serde_json::Value>,
    pub count: usize,
}

/// Build the envelope that wraps a `ServerMessage`, stamping `timestamp` on
/// the way out (spec §4.6: "server-set on outbound").
pub fn wrap_outbound(body: ServerMessage, request_id: Option<String>) -> serde_json::Value {
    let mut value = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    if let serde_json::Value::Object(map) = &mut value {
        map.insert(
            "protocolVersion".to_string(),
            serde_json::Value::String(PROTOCOL_VERSION.to_string()),
        );
        map.insert(
            "requestId".to_string(),
            match request_id {
                Some(id) => serde_json::Value::String(id),
                None => serde_json::Value::Null,
            },
        );
        map.insert(
            "timestamp".to_string(),
            serde_json::Value::from(chrono::Utc::now().timestamp_millis()),
        );
    }
    value
}

// ---------------------------------------------------------------------------
// Error codes (spec §6)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidSymbol,
    InvalidInterval,
    InvalidDateRange,
    ExchangeNotFound,
    RateLimitExceeded,
    InternalError,
    ServiceUnavailable,
    InvalidSymbols,
    SymbolNotFound,
    ExchangeNotSupported,
    SubscriptionNotFound,
    Timeout,
    UnknownAction,
    InvalidParameters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_subscribe_request_camel_case() {
        let raw = r#"{"type":"SUBSCRIBE","data":{"keys":["BINANCE:BTCUSDT@KLINE_1"]}}"#;
        let req: ClientRequest = serde_json::from_str(raw).expect("should decode");
        match req {
            ClientRequest::Subscribe(s) => assert_eq!(s.keys, vec!["BINANCE:BTCUSDT@KLINE_1"]),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn decodes_get_klines_camel_case_fields() {
        let raw = r#"{"type":"GET_KLINES","data":{"symbol":"BINANCE:BTCUSDT","interval":"60","fromTime":1,"toTime":2}}"#;
        let req: ClientRequest = serde_json::from_str(raw).expect("should decode");
        match req {
            ClientRequest::GetKlines(k) => {
                assert_eq!(k.from_time, 1);
                assert_eq!(k.to_time, 2);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn encodes_update_message_camel_case() {
        let msg = ServerMessage::Update(UpdateData {
            subscription_key: "BINANCE:BTCUSDT@KLINE_1".into(),
            content: serde_json::json!({"close": 1}),
        });
        let value = wrap_outbound(msg, None);
        assert_eq!(value["type"], "UPDATE");
        assert_eq!(value["data"]["subscriptionKey"], "BINANCE:BTCUSDT@KLINE_1");
        assert_eq!(value["protocolVersion"], PROTOCOL_VERSION);
    }

    #[test]
    fn ack_carries_request_id() {
        let value = wrap_outbound(ServerMessage::Ack, Some("r1".into()));
        assert_eq!(value["type"], "ACK");
        assert_eq!(value["requestId"], "r1");
    }
}

impl std::fmt::Debug for ClientRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}
