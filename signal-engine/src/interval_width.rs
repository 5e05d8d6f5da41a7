// =============================================================================
// Interval width — grammar interval token -> bucket width in milliseconds
// =============================================================================
//
// Used only for runtime gap classification (spec §4.9: `gap == 0`,
// `gap == interval`, `gap > interval * 1.5`). `D`/`W`/`M` are calendar units
// with no fixed millisecond width; the engine only ever runs this strategy
// set against intraday kline streams in practice, so the approximations
// below (30-day month) are documented rather than exact.
// =============================================================================

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

pub fn interval_width_ms(token: &str) -> Option<i64> {
    Some(match token {
        "1" => MINUTE_MS,
        "3" => 3 * MINUTE_MS,
        "5" => 5 * MINUTE_MS,
        "15" => 15 * MINUTE_MS,
        "30" => 30 * MINUTE_MS,
        "60" => HOUR_MS,
        "120" => 2 * HOUR_MS,
        "240" => 4 * HOUR_MS,
        "360" => 6 * HOUR_MS,
        "480" => 8 * HOUR_MS,
        "720" => 12 * HOUR_MS,
        "D" => DAY_MS,
        "3D" => 3 * DAY_MS,
        "W" => 7 * DAY_MS,
        "M" => 30 * DAY_MS,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tokens_resolve() {
        assert_eq!(interval_width_ms("1"), Some(60_000));
        assert_eq!(interval_width_ms("60"), Some(3_600_000));
        assert_eq!(interval_width_ms("D"), Some(86_400_000));
    }

    #[test]
    fn unknown_token_is_none() {
        assert_eq!(interval_width_ms("7"), None);
    }
}
