// =============================================================================
// Shannon Entropy Filter — Information-Theoretic Regime Signal
// =============================================================================
//
// Classifies each bar as UP (close > open) or DOWN (close <= open) and
// computes the binary Shannon entropy of that distribution over a rolling
// window:
//
//   H = -p_up * log2(p_up) - p_down * log2(p_down)
//
// Thresholds:
//   H >= 0.95        => BLOCK  — market is essentially random noise
//   0.80 <= H < 0.95 => REDUCE — uncertain, halve confidence
//   H < 0.80         => CLEAR — sufficient directional bias
// =============================================================================

use crate::bar::Bar;
use tracing::{trace, warn};

const DEFAULT_WINDOW: usize = 50;
const BLOCK_THRESHOLD: f64 = 0.95;
const REDUCE_THRESHOLD: f64 = 0.80;

/// Stateless filter — state lives in the bar slice the caller owns.
pub struct ShannonEntropyFilter;

impl ShannonEntropyFilter {
    /// Shannon entropy over the last `window` bars.
    pub fn calculate(bars: &[Bar], window: usize) -> Option<f64> {
        if window == 0 || bars.len() < window {
            trace!(available = bars.len(), window, "Entropy: insufficient bars");
            return None;
        }

        let slice = &bars[bars.len() - window..];
        let up_count = slice.iter().filter(|b| b.close > b.open).count();

        let p_up = up_count as f64 / window as f64;
        let p_down = 1.0 - p_up;
        let entropy = binary_entropy(p_up, p_down);

        trace!(p_up = format!("{:.4}", p_up), entropy = format!("{:.4}", entropy), window, "Entropy calculated");
        Some(entropy)
    }

    /// Entropy with the default window, returned as a trading decision:
    /// `(allowed, entropy, adjustment_factor)`. Defaults to permissive CLEAR
    /// when entropy cannot be computed.
    pub fn check(bars: &[Bar]) -> (bool, f64, f64) {
        match Self::calculate(bars, DEFAULT_WINDOW) {
            Some(entropy) => {
                let (allowed, factor) = if entropy >= BLOCK_THRESHOLD {
                    warn!(entropy = format!("{:.4}", entropy), "Entropy BLOCK: market is near-random noise");
                    (false, 0.0)
                } else if entropy >= REDUCE_THRESHOLD {
                    (true, 0.5)
                } else {
                    (true, 1.0)
                };
                (allowed, entropy, factor)
            }
            None => (true, 0.0, 1.0),
        }
    }
}

#[inline]
fn binary_entropy(p: f64, q: f64) -> f64 {
    let h_p = if p > 0.0 { -p * p.log2() } else { 0.0 };
    let h_q = if q > 0.0 { -q * q.log2() } else { 0.0 };
    h_p + h_q
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, close: f64) -> Bar {
        Bar {
            open_time: 0,
            close_time: 0,
            open,
            high: close.max(open),
            low: close.min(open),
            close,
            volume: 1.0,
            is_closed: true,
        }
    }

    #[test]
    fn test_all_up_candles_zero_entropy() {
        let bars: Vec<Bar> = (0..50).map(|_| bar(100.0, 110.0)).collect();
        let h = ShannonEntropyFilter::calculate(&bars, 50).unwrap();
        assert!(h.abs() < 1e-10);
    }

    #[test]
    fn test_balanced_candles_max_entropy() {
        let mut bars = Vec::new();
        for i in 0..50 {
            if i < 25 { bars.push(bar(100.0, 110.0)); } else { bars.push(bar(110.0, 100.0)); }
        }
        let h = ShannonEntropyFilter::calculate(&bars, 50).unwrap();
        assert!((h - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_check_block() {
        let mut bars = Vec::new();
        for i in 0..50 {
            if i < 25 { bars.push(bar(100.0, 110.0)); } else { bars.push(bar(110.0, 100.0)); }
        }
        let (allowed, entropy, factor) = ShannonEntropyFilter::check(&bars);
        assert!(!allowed);
        assert!((entropy - 1.0).abs() < 1e-10);
        assert!((factor - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_check_clear() {
        let bars: Vec<Bar> = (0..50).map(|_| bar(100.0, 110.0)).collect();
        let (allowed, entropy, factor) = ShannonEntropyFilter::check(&bars);
        assert!(allowed);
        assert!(entropy.abs() < 1e-10);
        assert!((factor - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_insufficient_data_returns_none() {
        let bars: Vec<Bar> = (0..10).map(|_| bar(100.0, 110.0)).collect();
        assert!(ShannonEntropyFilter::calculate(&bars, 50).is_none());
    }

    #[test]
    fn test_check_insufficient_data_defaults_clear() {
        let bars: Vec<Bar> = (0..10).map(|_| bar(100.0, 110.0)).collect();
        let (allowed, _, factor) = ShannonEntropyFilter::check(&bars);
        assert!(allowed);
        assert!((factor - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_reduce_zone() {
        let mut bars = Vec::new();
        for i in 0..50 {
            if i < 35 { bars.push(bar(100.0, 110.0)); } else { bars.push(bar(110.0, 100.0)); }
        }
        let h = ShannonEntropyFilter::calculate(&bars, 50).unwrap();
        assert!(h >= REDUCE_THRESHOLD && h < BLOCK_THRESHOLD, "got {:.4}", h);
        let (allowed, _, factor) = ShannonEntropyFilter::check(&bars);
        assert!(allowed);
        assert!((factor - 0.5).abs() < 1e-10);
    }
}
