// =============================================================================
// Subscription reconciliation — `subscription.add`/`remove`/`clean` → upstream
// WS intents (spec §4.8)
// =============================================================================

use tracing::{debug, warn};

use aurora_core::envelope::{Channel, NotificationEnvelope, SubscriptionAddData, SubscriptionRemoveData};
use aurora_core::subscription_key::{DataType, SubscriptionKey};

use crate::interval_map;
use crate::ws_multiplexer::Multiplexer;

/// Route one `subscription.*` notification to the multiplexer's batching
/// queue. `subscription.clean` is handled by the caller (it triggers a full
/// reconnect, not a queued intent) — see `main.rs`.
pub fn handle(mux: &Multiplexer, envelope: &NotificationEnvelope) {
    match envelope.channel() {
        Some(Channel::SubscriptionAdd) => {
            let Ok(data) = serde_json::from_value::<SubscriptionAddData>(envelope.data.clone()) else {
                warn!("malformed subscription.add payload, dropping");
                return;
            };
            if let Some(stream) = stream_for_key(&data.subscription_key) {
                mux.queue_subscribe(stream);
            }
        }
        Some(Channel::SubscriptionRemove) => {
            let Ok(data) = serde_json::from_value::<SubscriptionRemoveData>(envelope.data.clone()) else {
                warn!("malformed subscription.remove payload, dropping");
                return;
            };
            if let Some(stream) = stream_for_key(&data.subscription_key) {
                mux.queue_unsubscribe(stream);
            }
        }
        other => debug!(?other, "channel not handled by subscription reconciler"),
    }
}

/// Translate a canonical subscription key into the upstream stream name, or
/// `None` for keys this worker doesn't mirror onto the public WS (ACCOUNT
/// keys are served by REST tasks, not streamed). Public for the full
/// resubscribe path in `main.rs`.
pub fn stream_for_key(key: &str) -> Option<String> {
    let parsed = SubscriptionKey::parse(key)?;
    match parsed.data_type {
        DataType::Kline => interval_map::kline_stream_name(&parsed.symbol, parsed.interval.as_deref()?),
        DataType::Trade => Some(format!("{}@trade", parsed.symbol.to_ascii_lowercase())),
        DataType::Quotes => Some(format!("{}@bookTicker", parsed.symbol.to_ascii_lowercase())),
        DataType::Account => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kline_key_to_stream_name() {
        assert_eq!(stream_for_key("BINANCE:BTCUSDT@KLINE_60").as_deref(), Some("btcusdt@kline_1h"));
    }

    #[test]
    fn maps_trade_key_to_stream_name() {
        assert_eq!(stream_for_key("BINANCE:ETHUSDT@TRADE").as_deref(), Some("ethusdt@trade"));
    }

    #[test]
    fn account_keys_have_no_upstream_stream() {
        assert!(stream_for_key("BINANCE:ACCOUNT@SPOT").is_none());
    }
}
