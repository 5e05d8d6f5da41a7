// =============================================================================
// Two-condition admission test (spec §4.9 step 3)
// =============================================================================
//
// A kline cache is admitted once it has at least `REQUIRED_KLINES` bars and
// those bars are contiguous (no missing buckets). Time-alignment-with-now is
// deliberately not checked — see spec §4.9's rationale for skipping it.
// =============================================================================

use crate::bar::Bar;

pub const REQUIRED_KLINES: usize = 280;

/// Bucket width in milliseconds for a kline interval, in the venue's own
/// closed-interval terms (derived from two consecutive admitted bars rather
/// than recomputed from the TradingView token, since the cache already has
/// the ground truth).
fn bucket_width(bars: &[Bar]) -> Option<i64> {
    bars.windows(2).map(|w| w[1].open_time - w[0].open_time).min()
}

/// `true` when `bars` has enough history and no gaps between consecutive
/// `open_time`s.
pub fn is_admissible(bars: &[Bar]) -> bool {
    if bars.len() < REQUIRED_KLINES {
        return false;
    }

    let Some(width) = bucket_width(bars) else {
        return false;
    };
    if width <= 0 {
        return false;
    }

    bars.windows(2).all(|w| w[1].open_time - w[0].open_time == width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open_time: i64) -> Bar {
        Bar { open_time, close_time: open_time + 59_999, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0, is_closed: true }
    }

    #[test]
    fn rejects_too_few_bars() {
        let bars: Vec<Bar> = (0..100).map(|i| bar(i * 60_000)).collect();
        assert!(!is_admissible(&bars));
    }

    #[test]
    fn accepts_contiguous_bars_at_threshold() {
        let bars: Vec<Bar> = (0..REQUIRED_KLINES as i64).map(|i| bar(i * 60_000)).collect();
        assert!(is_admissible(&bars));
    }

    #[test]
    fn rejects_bars_with_a_gap() {
        let mut bars: Vec<Bar> = (0..REQUIRED_KLINES as i64).map(|i| bar(i * 60_000)).collect();
        bars[150] = bar(bars[150].open_time + 60_000);
        assert!(!is_admissible(&bars));
    }
}
