// =============================================================================
// Interval mapping — subscription-key grammar tokens ⇄ venue kline intervals
// =============================================================================
//
// The subscription-key grammar (core::subscription_key) carries TradingView-
// style interval tokens ("1", "60", "D", "3D", "W", "M"). The venue's stream
// names and REST `interval` params use its own vocabulary ("1m", "1h", "1d",
// "3d", "1w", "1M"). This is the one place that translation happens (spec §9
// Open Questions — "where does the TV-interval mapping live" resolved here,
// see DESIGN.md).
// =============================================================================

/// Translate a grammar interval token into the venue's kline interval string.
/// Returns `None` for anything outside `subscription_key::VALID_INTERVALS`.
pub fn to_venue_interval(token: &str) -> Option<&'static str> {
    Some(match token {
        "1" => "1m",
        "3" => "3m",
        "5" => "5m",
        "15" => "15m",
        "30" => "30m",
        "60" => "1h",
        "120" => "2h",
        "240" => "4h",
        "360" => "6h",
        "480" => "8h",
        "720" => "12h",
        "D" => "1d",
        "3D" => "3d",
        "W" => "1w",
        "M" => "1M",
        _ => return None,
    })
}

/// Translate a venue kline interval string back into the grammar's token.
pub fn from_venue_interval(venue: &str) -> Option<&'static str> {
    Some(match venue {
        "1m" => "1",
        "3m" => "3",
        "5m" => "5",
        "15m" => "15",
        "30m" => "30",
        "1h" => "60",
        "2h" => "120",
        "4h" => "240",
        "6h" => "360",
        "8h" => "480",
        "12h" => "720",
        "1d" => "D",
        "3d" => "3D",
        "1w" => "W",
        "1M" => "M",
        _ => return None,
    })
}

/// Build the lowercase `<symbol>@kline_<venue-interval>` stream name the
/// upstream combined-stream WebSocket expects.
pub fn kline_stream_name(symbol: &str, grammar_interval: &str) -> Option<String> {
    let venue_interval = to_venue_interval(grammar_interval)?;
    Some(format!("{}@kline_{}", symbol.to_ascii_lowercase(), venue_interval))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_valid_interval() {
        for token in aurora_core::subscription_key::VALID_INTERVALS {
            let venue = to_venue_interval(token).unwrap_or_else(|| panic!("no venue mapping for {token}"));
            assert_eq!(from_venue_interval(venue), Some(*token));
        }
    }

    #[test]
    fn builds_kline_stream_name() {
        assert_eq!(kline_stream_name("BTCUSDT", "60").as_deref(), Some("btcusdt@kline_1h"));
    }

    #[test]
    fn rejects_unknown_interval() {
        assert!(to_venue_interval("7").is_none());
    }
}
