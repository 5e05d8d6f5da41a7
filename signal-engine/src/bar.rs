// =============================================================================
// Bar — the signal engine's working OHLCV unit (spec §4.9 "klineCache")
// =============================================================================
//
// Mirrors the teacher's `market_data::Candle` shape, trimmed to the fields
// indicators and gap classification actually need.
// =============================================================================

use aurora_core::models::KlineHistoryRow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_closed: bool,
}

impl From<KlineHistoryRow> for Bar {
    fn from(row: KlineHistoryRow) -> Self {
        Self {
            open_time: row.open_time,
            close_time: row.close_time,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            is_closed: true,
        }
    }
}

/// Decode the live tick payload the exchange worker writes into
/// `realtime_data.data` (see exchange-worker's `tick_handler::kline_payload`).
pub fn bar_from_tick(data: &serde_json::Value) -> Option<Bar> {
    Some(Bar {
        open_time: data.get("openTime")?.as_i64()?,
        close_time: data.get("closeTime")?.as_i64()?,
        open: data.get("open")?.as_f64()?,
        high: data.get("high")?.as_f64()?,
        low: data.get("low")?.as_f64()?,
        close: data.get("close")?.as_f64()?,
        volume: data.get("volume")?.as_f64()?,
        is_closed: data.get("isClosed")?.as_bool()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tick_payload_into_bar() {
        let data = serde_json::json!({
            "isClosed": true, "openTime": 1, "closeTime": 2,
            "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 10.0
        });
        let bar = bar_from_tick(&data).unwrap();
        assert_eq!(bar.open_time, 1);
        assert!(bar.is_closed);
    }

    #[test]
    fn missing_field_returns_none() {
        assert!(bar_from_tick(&serde_json::json!({"openTime": 1})).is_none());
    }
}
