// =============================================================================
// Row types — one `sqlx::FromRow` struct per table in spec §3
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub task_type: String,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fixed task-type vocabulary (spec §3 "Task").
pub mod task_type {
    pub const GET_KLINES: &str = "get_klines";
    pub const GET_SERVER_TIME: &str = "get_server_time";
    pub const GET_QUOTES: &str = "get_quotes";
    pub const GET_SPOT_ACCOUNT: &str = "get_spot_account";
    pub const GET_FUTURES_ACCOUNT: &str = "get_futures_account";
    pub const FETCH_EXCHANGE_INFO: &str = "system.fetch_exchange_info";
}

/// Subscriber labels used in `realtime_data.subscribers` (spec §4.4, §4.9).
pub mod source_label {
    pub const API_SERVICE: &str = "api-service";
    pub const SIGNAL_SERVICE: &str = "signal-service";
}

pub mod task_status {
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RealtimeDataRow {
    pub subscription_key: String,
    pub data_type: String,
    pub data: serde_json::Value,
    pub event_time: DateTime<Utc>,
    pub subscribers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct KlineHistoryRow {
    pub symbol: String,
    pub interval: String,
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExchangeInfoRow {
    pub exchange: String,
    pub market_type: String,
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub status: String,
    pub filters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AlertConfigRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub strategy_type: String,
    pub symbol: String,
    pub interval: String,
    pub trigger_type: String,
    pub params: serde_json::Value,
    pub enabled: bool,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fixed trigger-type vocabulary (spec §3 "Alert Config").
pub mod trigger_type {
    pub const ONCE_ONLY: &str = "once_only";
    pub const EACH_KLINE: &str = "each_kline";
    pub const EACH_KLINE_CLOSE: &str = "each_kline_close";
    pub const EACH_MINUTE: &str = "each_minute";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalValue {
    Long,
    Short,
    None,
}

impl SignalValue {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalValue::Long => "long",
            SignalValue::Short => "short",
            SignalValue::None => "none",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StrategySignalRow {
    pub id: i64,
    pub alert_id: Uuid,
    pub strategy_type: String,
    pub symbol: String,
    pub interval: String,
    pub trigger_type: String,
    pub signal: String,
    pub reason: Option<String>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StrategyMetadataRow {
    pub strategy_type: String,
    pub name: String,
    pub description: String,
    pub params_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccountInfoRow {
    pub account_type: String,
    pub balances: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
