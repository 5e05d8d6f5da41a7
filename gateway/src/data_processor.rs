// =============================================================================
// Data Processor (spec §4.1 / §4.7 / C7)
// =============================================================================
//
// Translates decoded `NotificationEnvelope`s arriving off the Coordination
// Fabric listener into outbound client messages, then hands them to the
// Client Manager for delivery. One function per channel this process cares
// about; `dispatch` is the single entry point the listener loop calls.
// =============================================================================

use std::sync::Arc;

use aurora_core::envelope::{Channel, NotificationEnvelope, RealtimeUpdateData, SignalNewData, TaskCompletedData, TaskFailedData};
use aurora_core::models::task_type;
use aurora_core::protocol::{wrap_outbound, ErrorCode, ErrorData, ServerMessage, UpdateData};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::client_manager::ClientManager;
use crate::db;
use crate::subscription_manager::SubscriptionManager;
use crate::task_router::TaskRouter;

pub struct DataProcessor {
    pool: PgPool,
    clients: Arc<ClientManager>,
    subscriptions: Arc<SubscriptionManager>,
    tasks: Arc<TaskRouter>,
}

impl DataProcessor {
    pub fn new(pool: PgPool, clients: Arc<ClientManager>, subscriptions: Arc<SubscriptionManager>, tasks: Arc<TaskRouter>) -> Self {
        Self {
            pool,
            clients,
            subscriptions,
            tasks,
        }
    }

    /// Route one decoded notification. Channels this process doesn't LISTEN
    /// on never reach here; unhandled channels just log at debug and return.
    pub async fn dispatch(&self, envelope: NotificationEnvelope) {
        let Some(channel) = envelope.channel() else {
            warn!(event_type = %envelope.event_type, "unrecognized notification channel");
            return;
        };

        match channel {
            Channel::TaskCompleted => self.handle_task_completed(envelope.data).await,
            Channel::TaskFailed => self.handle_task_failed(envelope.data),
            Channel::RealtimeUpdate => self.handle_realtime_update(envelope.data),
            Channel::SignalNew => self.handle_signal_new(envelope.data),
            other => debug!(channel = other.as_str(), "channel not handled by gateway data processor"),
        }
    }

    /// `get_klines` and `get_*_account` tasks carry `result=null` — the
    /// exchange worker writes `klines_history`/`account_info` directly, so
    /// the response here is formed by reading those tables rather than by
    /// trusting the task row (spec §4.7).
    async fn handle_task_completed(&self, data: serde_json::Value) {
        let data: TaskCompletedData = match serde_json::from_value(data) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "malformed task.completed payload");
                return;
            }
        };
        let Some((client_id, request_id)) = self.tasks.resolve(data.id) else {
            debug!(task_id = data.id, "task.completed for unknown or already-resolved task");
            return;
        };
        let message = self.outbound_for_task(&data).await;
        self.clients.send_to(client_id, wrap_outbound(message, request_id));
    }

    async fn outbound_for_task(&self, data: &TaskCompletedData) -> ServerMessage {
        match data.task_type.as_str() {
            task_type::GET_KLINES => self.klines_from_payload(&data.payload).await,
            task_type::GET_SPOT_ACCOUNT => self.account_data("SPOT").await,
            task_type::GET_FUTURES_ACCOUNT => self.account_data("FUTURES").await,
            _ => outbound_for_task_type(&data.task_type, data.result.clone().unwrap_or(serde_json::Value::Null)),
        }
    }

    async fn klines_from_payload(&self, payload: &serde_json::Value) -> ServerMessage {
        let symbol = payload["symbol"].as_str().unwrap_or_default();
        let interval = payload["interval"].as_str().unwrap_or_default();
        let from_time = payload["fromTime"].as_i64().unwrap_or(0);
        let to_time = payload["toTime"].as_i64().unwrap_or(i64::MAX);

        match db::klines_range(&self.pool, symbol, interval, from_time, to_time).await {
            Ok(rows) => {
                let bars: Vec<serde_json::Value> = rows.into_iter().map(|r| serde_json::to_value(r).unwrap()).collect();
                ServerMessage::KlinesData(aurora_core::protocol::KlinesData { count: bars.len(), bars })
            }
            Err(e) => {
                warn!(error = %e, symbol, interval, "failed to read klines_history for completed task");
                ServerMessage::KlinesData(aurora_core::protocol::KlinesData { count: 0, bars: Vec::new() })
            }
        }
    }

    async fn account_data(&self, account_type: &str) -> ServerMessage {
        match db::account_balances(&self.pool, account_type).await {
            Ok(Some(balances)) => ServerMessage::AccountData(balances),
            Ok(None) => ServerMessage::AccountData(serde_json::Value::Null),
            Err(e) => {
                warn!(error = %e, account_type, "failed to read account_info for completed task");
                ServerMessage::AccountData(serde_json::Value::Null)
            }
        }
    }

    fn handle_task_failed(&self, data: serde_json::Value) {
        let data: TaskFailedData = match serde_json::from_value(data) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "malformed task.failed payload");
                return;
            }
        };
        let Some((client_id, request_id)) = self.tasks.resolve(data.id) else {
            debug!(task_id = data.id, "task.failed for unknown or already-resolved task");
            return;
        };
        let message = ServerMessage::Error(ErrorData {
            error_code: ErrorCode::InternalError,
            error_message: data
                .result
                .and_then(|r| r.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| "upstream task failed".to_string()),
        });
        self.clients.send_to(client_id, wrap_outbound(message, request_id));
    }

    fn handle_realtime_update(&self, data: serde_json::Value) {
        let data: RealtimeUpdateData = match serde_json::from_value(data) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "malformed realtime.update payload");
                return;
            }
        };
        let subscribers = self.subscriptions.subscribers_of(&data.subscription_key);
        if subscribers.is_empty() {
            return;
        }
        let message = wrap_outbound(
            ServerMessage::Update(UpdateData {
                subscription_key: data.subscription_key,
                content: data.data,
            }),
            None,
        );
        let delivered = self.clients.broadcast(&subscribers, &message);
        debug!(delivered, "fanned out realtime.update");
    }

    fn handle_signal_new(&self, data: serde_json::Value) {
        let data: SignalNewData = match serde_json::from_value(data) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "malformed signal.new payload");
                return;
            }
        };
        // Signals are delivered on the synthetic `SIGNAL:<alert_id>` key —
        // clients subscribe to that key per alert, not per symbol/interval.
        let key = aurora_core::subscription_key::signal_key(data.alert_id);
        let subscribers = self.subscriptions.subscribers_of(&key);
        if subscribers.is_empty() {
            return;
        }
        let message = wrap_outbound(
            ServerMessage::Update(UpdateData {
                subscription_key: key,
                content: serde_json::to_value(&data).unwrap_or(serde_json::Value::Null),
            }),
            None,
        );
        self.clients.broadcast(&subscribers, &message);
    }
}

/// Map a completed task's type to the `ServerMessage` variant its waiting
/// client expects, for the task types whose `result` is meaningful
/// (`get_klines` and `get_*_account` go through [`DataProcessor::outbound_for_task`]
/// instead, since their `result` is null).
fn outbound_for_task_type(task_type: &str, result: serde_json::Value) -> ServerMessage {
    match task_type {
        task_type::GET_QUOTES => ServerMessage::QuotesData(result),
        task_type::GET_SERVER_TIME => ServerMessage::ConfigData(result),
        _ => ServerMessage::ConfigData(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_quotes_result_becomes_quotes_data() {
        let result = serde_json::json!({"BTCUSDT": "65000.0"});
        let msg = outbound_for_task_type(aurora_core::models::task_type::GET_QUOTES, result.clone());
        match msg {
            ServerMessage::QuotesData(v) => assert_eq!(v, result),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_task_type_falls_back_to_config_data() {
        let msg = outbound_for_task_type("something_else", serde_json::json!({"ok": true}));
        assert!(matches!(msg, ServerMessage::ConfigData(_)));
    }
}
