// =============================================================================
// klineCache — the working price series per subscribed K-line stream
// (spec §4.9)
// =============================================================================
//
// Plain ordered-by-open_time storage with the two mutations the runtime loop
// needs: update the last bar in place, or append a new one. Gap classification
// and fill-repair live in `engine.rs`, which owns the cache and decides which
// mutation applies.
// =============================================================================

use crate::bar::Bar;

#[derive(Debug, Default)]
pub struct KlineCache {
    bars: Vec<Bar>,
}

impl KlineCache {
    pub fn from_history(mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.open_time);
        Self { bars }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn replace(&mut self, bars: Vec<Bar>) {
        let mut bars = bars;
        bars.sort_by_key(|b| b.open_time);
        self.bars = bars;
    }

    /// Update the most recent bar in place (`gap == 0`).
    pub fn update_last(&mut self, bar: Bar) {
        match self.bars.last_mut() {
            Some(last) => *last = bar,
            None => self.bars.push(bar),
        }
    }

    /// Append a new bar (`gap == interval`), keeping the series bounded so
    /// memory doesn't grow without limit for long-lived subscriptions.
    pub fn append(&mut self, bar: Bar, max_len: usize) {
        self.bars.push(bar);
        if self.bars.len() > max_len {
            let overflow = self.bars.len() - max_len;
            self.bars.drain(0..overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open_time: i64, close: f64) -> Bar {
        Bar { open_time, close_time: open_time + 59_999, open: close, high: close, low: close, close, volume: 1.0, is_closed: true }
    }

    #[test]
    fn update_last_replaces_most_recent_bar() {
        let mut cache = KlineCache::from_history(vec![bar(0, 1.0), bar(60_000, 2.0)]);
        cache.update_last(bar(60_000, 3.0));
        assert_eq!(cache.last().unwrap().close, 3.0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn append_grows_and_truncates_at_max_len() {
        let mut cache = KlineCache::from_history(vec![bar(0, 1.0)]);
        cache.append(bar(60_000, 2.0), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.last().unwrap().close, 2.0);
    }

    #[test]
    fn from_history_sorts_by_open_time() {
        let cache = KlineCache::from_history(vec![bar(60_000, 2.0), bar(0, 1.0)]);
        assert_eq!(cache.bars()[0].open_time, 0);
    }
}
