// =============================================================================
// Notification envelope & channel contract (spec §4.1)
// =============================================================================
//
// Every trigger fires `pg_notify(channel, json_envelope)` where the envelope
// is always `{event_id, event_type, timestamp, data}`. This module is the
// Rust-side mirror of that contract: the channel list, the envelope shape,
// and one typed `data` struct per channel so consumers pattern-match instead
// of poking at raw `serde_json::Value`.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed set of channels the schema layer notifies on. `as_str` is the
/// literal string passed to `LISTEN`/`pg_notify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    TaskNew,
    TaskCompleted,
    TaskFailed,
    SubscriptionAdd,
    SubscriptionRemove,
    SubscriptionClean,
    RealtimeUpdate,
    SignalNew,
    AlertConfigNew,
    AlertConfigUpdate,
    AlertConfigDelete,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::TaskNew => "task.new",
            Channel::TaskCompleted => "task.completed",
            Channel::TaskFailed => "task.failed",
            Channel::SubscriptionAdd => "subscription.add",
            Channel::SubscriptionRemove => "subscription.remove",
            Channel::SubscriptionClean => "subscription.clean",
            Channel::RealtimeUpdate => "realtime.update",
            Channel::SignalNew => "signal.new",
            Channel::AlertConfigNew => "alert_config.new",
            Channel::AlertConfigUpdate => "alert_config.update",
            Channel::AlertConfigDelete => "alert_config.delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "task.new" => Channel::TaskNew,
            "task.completed" => Channel::TaskCompleted,
            "task.failed" => Channel::TaskFailed,
            "subscription.add" => Channel::SubscriptionAdd,
            "subscription.remove" => Channel::SubscriptionRemove,
            "subscription.clean" => Channel::SubscriptionClean,
            "realtime.update" => Channel::RealtimeUpdate,
            "signal.new" => Channel::SignalNew,
            "alert_config.new" => Channel::AlertConfigNew,
            "alert_config.update" => Channel::AlertConfigUpdate,
            "alert_config.delete" => Channel::AlertConfigDelete,
            _ => return None,
        })
    }
}

/// The channel set the gateway needs to LISTEN on.
pub const GATEWAY_CHANNELS: &[Channel] = &[
    Channel::TaskCompleted,
    Channel::TaskFailed,
    Channel::RealtimeUpdate,
    Channel::SignalNew,
];

/// The channel set the exchange worker needs to LISTEN on.
pub const EXCHANGE_WORKER_CHANNELS: &[Channel] = &[
    Channel::TaskNew,
    Channel::SubscriptionAdd,
    Channel::SubscriptionRemove,
    Channel::SubscriptionClean,
];

/// The channel set the signal engine needs to LISTEN on.
pub const SIGNAL_ENGINE_CHANNELS: &[Channel] = &[
    Channel::RealtimeUpdate,
    Channel::AlertConfigNew,
    Channel::AlertConfigUpdate,
    Channel::AlertConfigDelete,
    Channel::TaskCompleted,
    Channel::TaskFailed,
];

/// The envelope every `pg_notify` payload decodes into before the `data`
/// field is interpreted per-channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl NotificationEnvelope {
    /// Decode a raw `NOTIFY` payload string. Invalid JSON is the caller's
    /// signal to log-and-drop per spec §4.2 — this just surfaces the error.
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn channel(&self) -> Option<Channel> {
        Channel::from_str(&self.event_type)
    }
}

// ---------------------------------------------------------------------------
// Per-channel payload shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNewData {
    pub id: i64,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompletedData {
    pub id: i64,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailedData {
    pub id: i64,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionAddData {
    pub subscription_key: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRemoveData {
    pub subscription_key: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCleanData {
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeUpdateData {
    pub subscription_key: String,
    pub data_type: String,
    pub data: serde_json::Value,
    pub event_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalNewData {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_round_trips_through_str() {
        for ch in [
            Channel::TaskNew,
            Channel::TaskCompleted,
            Channel::TaskFailed,
            Channel::SubscriptionAdd,
            Channel::SubscriptionRemove,
            Channel::SubscriptionClean,
            Channel::RealtimeUpdate,
            Channel::SignalNew,
            Channel::AlertConfigNew,
            Channel::AlertConfigUpdate,
            Channel::AlertConfigDelete,
        ] {
            assert_eq!(Channel::from_str(ch.as_str()), Some(ch));
        }
    }

    #[test]
    fn unknown_channel_name_is_none() {
        assert_eq!(Channel::from_str("bogus.channel"), None);
    }

    #[test]
    fn envelope_parses_realtime_update() {
        let raw = r#"{
            "event_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "event_type": "realtime.update",
            "timestamp": "2026-01-01T00:00:00Z",
            "data": {
                "subscription_key": "BINANCE:BTCUSDT@KLINE_1",
                "data_type": "KLINE",
                "data": {"close": 42000.0},
                "event_time": "2026-01-01T00:00:00Z"
            }
        }"#;
        let env = NotificationEnvelope::parse(raw).expect("should parse");
        assert_eq!(env.channel(), Some(Channel::RealtimeUpdate));
        let data: RealtimeUpdateData = serde_json::from_value(env.data).unwrap();
        assert_eq!(data.subscription_key, "BINANCE:BTCUSDT@KLINE_1");
    }
}
