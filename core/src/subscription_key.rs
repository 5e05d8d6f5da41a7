// =============================================================================
// Subscription key grammar (spec §6 — bit-exact, parsed by both the gateway
// and the signal engine)
// =============================================================================
//
//   key        := exchange ":" symbol [ "." suffix ] "@" datatype [ "_" interval ]
//   datatype   := "KLINE" | "QUOTES" | "TRADE" | "ACCOUNT"
//   interval   := "1"|"3"|"5"|"15"|"30"|"60"|"120"|"240"|"360"|"480"|"720"
//               | "D"|"3D"|"W"|"M"
//
// Account-type keys: `<EXCHANGE>:ACCOUNT@SPOT`, `<EXCHANGE>:ACCOUNT@FUTURES`.
// Signal keys use the synthetic form `SIGNAL:<alert_id>` and are handled as a
// distinct variant — they never round-trip through this grammar.
// =============================================================================

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Kline,
    Quotes,
    Trade,
    Account,
}

impl DataType {
    fn as_str(self) -> &'static str {
        match self {
            DataType::Kline => "KLINE",
            DataType::Quotes => "QUOTES",
            DataType::Trade => "TRADE",
            DataType::Account => "ACCOUNT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "KLINE" => Some(DataType::Kline),
            "QUOTES" => Some(DataType::Quotes),
            "TRADE" => Some(DataType::Trade),
            "ACCOUNT" => Some(DataType::Account),
            _ => None,
        }
    }
}

/// The fixed set of intervals the grammar allows, in TradingView format.
pub const VALID_INTERVALS: &[&str] = &[
    "1", "3", "5", "15", "30", "60", "120", "240", "360", "480", "720", "D", "3D", "W", "M",
];

/// A parsed, canonical subscription key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub exchange: String,
    pub symbol: String,
    pub suffix: Option<String>,
    pub data_type: DataType,
    pub interval: Option<String>,
}

impl SubscriptionKey {
    pub fn kline(exchange: &str, symbol: &str, interval: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            suffix: None,
            data_type: DataType::Kline,
            interval: Some(interval.to_string()),
        }
    }

    pub fn account(exchange: &str, is_futures: bool) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: "ACCOUNT".to_string(),
            suffix: None,
            data_type: DataType::Account,
            interval: Some(if is_futures { "FUTURES" } else { "SPOT" }.to_string()),
        }
    }

    /// Parse the canonical string form. Returns `None` for anything that
    /// doesn't match the grammar exactly — callers should reject the
    /// request with `INVALID_SYMBOL` rather than guess at intent.
    pub fn parse(raw: &str) -> Option<Self> {
        let (left, right) = raw.split_once('@')?;
        let (exchange, symbol_part) = left.split_once(':')?;
        if exchange.is_empty() || symbol_part.is_empty() {
            return None;
        }

        let (symbol, suffix) = match symbol_part.split_once('.') {
            Some((s, suf)) => (s, Some(suf.to_string())),
            None => (symbol_part, None),
        };
        if symbol.is_empty() {
            return None;
        }

        // Account keys are a literal special case: `ACCOUNT@SPOT` /
        // `ACCOUNT@FUTURES` — "SPOT"/"FUTURES" is not a `DataType` variant,
        // it rides in the interval slot instead.
        if symbol.eq_ignore_ascii_case("ACCOUNT") && (right == "SPOT" || right == "FUTURES") {
            return Some(Self {
                exchange: exchange.to_string(),
                symbol: symbol.to_string(),
                suffix,
                data_type: DataType::Account,
                interval: Some(right.to_string()),
            });
        }

        let (data_type_str, interval) = match right.split_once('_') {
            Some((dt, iv)) => (dt, Some(iv.to_string())),
            None => (right, None),
        };
        let data_type = DataType::parse(data_type_str)?;

        if let Some(iv) = &interval {
            if data_type == DataType::Kline && !VALID_INTERVALS.contains(&iv.as_str()) {
                return None;
            }
        }

        Some(Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            suffix,
            data_type,
            interval,
        })
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)?;
        if let Some(suf) = &self.suffix {
            write!(f, ".{suf}")?;
        }
        write!(f, "@{}", self.data_type.as_str())?;
        if let Some(iv) = &self.interval {
            write!(f, "_{iv}")?;
        }
        Ok(())
    }
}

/// The synthetic key form used for signal delivery: `SIGNAL:<alert_id>`.
pub fn signal_key(alert_id: uuid::Uuid) -> String {
    format!("SIGNAL:{alert_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kline_key() {
        let k = SubscriptionKey::parse("BINANCE:BTCUSDT@KLINE_60").unwrap();
        assert_eq!(k.exchange, "BINANCE");
        assert_eq!(k.symbol, "BTCUSDT");
        assert_eq!(k.data_type, DataType::Kline);
        assert_eq!(k.interval.as_deref(), Some("60"));
        assert_eq!(k.to_string(), "BINANCE:BTCUSDT@KLINE_60");
    }

    #[test]
    fn parses_key_with_suffix() {
        let k = SubscriptionKey::parse("BINANCE:BTCUSDT.PERP@TRADE").unwrap();
        assert_eq!(k.suffix.as_deref(), Some("PERP"));
        assert_eq!(k.data_type, DataType::Trade);
        assert!(k.interval.is_none());
    }

    #[test]
    fn parses_account_keys() {
        let k = SubscriptionKey::parse("BINANCE:ACCOUNT@SPOT").unwrap();
        assert_eq!(k.data_type, DataType::Account);
        assert_eq!(k.interval.as_deref(), Some("SPOT"));
    }

    #[test]
    fn rejects_bad_interval() {
        assert!(SubscriptionKey::parse("BINANCE:BTCUSDT@KLINE_7").is_none());
    }

    #[test]
    fn rejects_missing_at_or_colon() {
        assert!(SubscriptionKey::parse("BINANCE-BTCUSDT@KLINE_1").is_none());
        assert!(SubscriptionKey::parse("BINANCE:BTCUSDTKLINE_1").is_none());
    }

    #[test]
    fn signal_key_format() {
        let id = uuid::Uuid::nil();
        assert_eq!(signal_key(id), "SIGNAL:00000000-0000-0000-0000-000000000000");
    }
}
