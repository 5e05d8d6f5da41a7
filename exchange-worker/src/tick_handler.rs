// =============================================================================
// Tick handling — upstream WebSocket frame → `realtime_data` write (spec §4.8)
// =============================================================================
//
// The multiplexer hands us `{stream, payload}` pairs already split out of the
// venue's combined-stream envelope. This module turns the venue's own field
// names (`k.o`, `k.h`, ...) into the canonical shape `archive_closed_kline`
// expects, and resolves `stream` back to a subscription key via
// [`crate::interval_map`].
// =============================================================================

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::interval_map;
use crate::ws_multiplexer::Tick;

const EXCHANGE: &str = "BINANCE";

pub async fn handle_tick(pool: &PgPool, tick: Tick) {
    let Some((key, data_type, data)) = translate(&tick) else {
        debug!(stream = %tick.stream, "tick from unrecognized stream shape, dropping");
        return;
    };

    if let Err(e) = crate::db::write_tick(pool, &key, data_type, data, Utc::now()).await {
        warn!(error = %e, key = %key, "failed to write tick to realtime_data");
    }
}

fn translate(tick: &Tick) -> Option<(String, &'static str, Value)> {
    if let Some((symbol_lower, rest)) = tick.stream.split_once("@kline_") {
        let venue_interval = rest;
        let grammar_interval = interval_map::from_venue_interval(venue_interval)?;
        let key = format!("{}:{}@KLINE_{}", EXCHANGE, symbol_lower.to_ascii_uppercase(), grammar_interval);
        return Some((key, "KLINE", kline_payload(&tick.payload)?));
    }

    if let Some(symbol_lower) = tick.stream.strip_suffix("@trade") {
        let key = format!("{}:{}@TRADE", EXCHANGE, symbol_lower.to_ascii_uppercase());
        return Some((key, "TRADE", trade_payload(&tick.payload)?));
    }

    if let Some(symbol_lower) = tick.stream.strip_suffix("@bookTicker") {
        let key = format!("{}:{}@QUOTES", EXCHANGE, symbol_lower.to_ascii_uppercase());
        return Some((key, "QUOTES", quote_payload(&tick.payload)?));
    }

    None
}

/// Venue kline payload nests the bar under `k`; `x` is the closed flag.
fn kline_payload(raw: &Value) -> Option<Value> {
    let k = raw.get("k")?;
    Some(serde_json::json!({
        "isClosed": k.get("x")?.as_bool()?,
        "openTime": k.get("t")?.as_i64()?,
        "closeTime": k.get("T")?.as_i64()?,
        "open": parse_f64(k.get("o")?)?,
        "high": parse_f64(k.get("h")?)?,
        "low": parse_f64(k.get("l")?)?,
        "close": parse_f64(k.get("c")?)?,
        "volume": parse_f64(k.get("v")?)?,
    }))
}

fn trade_payload(raw: &Value) -> Option<Value> {
    Some(serde_json::json!({
        "price": parse_f64(raw.get("p")?)?,
        "quantity": parse_f64(raw.get("q")?)?,
        "tradeTime": raw.get("T")?.as_i64()?,
        "isBuyerMaker": raw.get("m")?.as_bool()?,
    }))
}

fn quote_payload(raw: &Value) -> Option<Value> {
    Some(serde_json::json!({
        "bidPrice": parse_f64(raw.get("b")?)?,
        "bidQty": parse_f64(raw.get("B")?)?,
        "askPrice": parse_f64(raw.get("a")?)?,
        "askQty": parse_f64(raw.get("A")?)?,
    }))
}

/// The venue sends numeric fields as JSON strings in most streams.
fn parse_f64(v: &Value) -> Option<f64> {
    v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_kline_tick() -> Tick {
        Tick {
            stream: "btcusdt@kline_1m".to_string(),
            payload: serde_json::json!({
                "k": {
                    "t": 1_700_000_000_000i64,
                    "T": 1_700_000_059_999i64,
                    "o": "42000.10", "h": "42100.00", "l": "41950.50", "c": "42050.25", "v": "12.5",
                    "x": true
                }
            }),
        }
    }

    #[test]
    fn translates_kline_stream_into_canonical_key_and_payload() {
        let (key, data_type, data) = translate(&sample_kline_tick()).unwrap();
        assert_eq!(key, "BINANCE:BTCUSDT@KLINE_1");
        assert_eq!(data_type, "KLINE");
        assert_eq!(data["isClosed"], true);
        assert_eq!(data["open"], 42000.10);
    }

    #[test]
    fn unrecognized_stream_shape_returns_none() {
        let tick = Tick { stream: "btcusdt@depth".to_string(), payload: serde_json::json!({}) };
        assert!(translate(&tick).is_none());
    }
}
