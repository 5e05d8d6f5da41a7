// =============================================================================
// Market Regime Detector
// =============================================================================
//
// Classifies the current market into one of five regimes using a multi-factor
// approach. Detection hierarchy (evaluated top-to-bottom; first match wins):
//
//   1. DEAD      — Entropy >= 0.95 (pure noise, no edge)
//   2. VOLATILE  — BBW > 5.0       (extreme volatility expansion)
//   3. SQUEEZE   — BBW < 1.5 AND ADX < 20 (compression, pre-breakout)
//   4. TRENDING  — ADX > 25 AND Hurst > 0.55 (persistent directional move)
//   5. RANGING   — ADX < 20 AND Hurst < 0.45 (mean-reverting chop)
//
// If no rule fires, the regime defaults to RANGING with low confidence.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::bar::Bar;
use crate::indicators::adx::calculate_adx;
use crate::indicators::bollinger::calculate_bollinger;
use crate::regime::entropy::ShannonEntropyFilter;
use crate::regime::hurst::calculate_hurst_exponent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketRegime {
    Trending,
    Ranging,
    Volatile,
    Squeeze,
    Dead,
}

impl std::fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trending => write!(f, "TRENDING"),
            Self::Ranging => write!(f, "RANGING"),
            Self::Volatile => write!(f, "VOLATILE"),
            Self::Squeeze => write!(f, "SQUEEZE"),
            Self::Dead => write!(f, "DEAD"),
        }
    }
}

/// Complete snapshot of the detected regime plus all contributing metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeState {
    pub regime: MarketRegime,
    pub adx: f64,
    pub bbw: f64,
    pub hurst: f64,
    pub entropy: f64,
    pub confidence: f64,
    pub regime_age_secs: f64,
}

/// Thread-safe regime detector that caches the latest state per alert.
pub struct RegimeDetector {
    state: RwLock<Option<RegimeState>>,
    last_change_time: RwLock<Instant>,
}

impl RegimeDetector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { state: RwLock::new(None), last_change_time: RwLock::new(Instant::now()) })
    }

    /// Run full regime detection on the provided bars and closing prices.
    pub fn detect(&self, bars: &[Bar], closes: &[f64]) -> Option<RegimeState> {
        let adx_value = calculate_adx(bars, 14).unwrap_or(0.0);
        let bb_result = calculate_bollinger(closes, 20, 2.0)?;
        let bbw_value = bb_result.width;
        let hurst_value = calculate_hurst_exponent(closes).unwrap_or(0.50);
        let entropy_value = ShannonEntropyFilter::calculate(bars, 50).unwrap_or(0.0);

        let (regime, confidence) = classify(adx_value, bbw_value, hurst_value, entropy_value);

        let now = Instant::now();
        let prev_regime = self.state.read().as_ref().map(|s| s.regime);
        if prev_regime != Some(regime) {
            *self.last_change_time.write() = now;
        }
        let regime_age_secs = now.duration_since(*self.last_change_time.read()).as_secs_f64();

        let new_state = RegimeState {
            regime,
            adx: adx_value,
            bbw: bbw_value,
            hurst: hurst_value,
            entropy: entropy_value,
            confidence,
            regime_age_secs,
        };

        debug!(
            regime = %regime,
            adx = format!("{:.2}", adx_value),
            bbw = format!("{:.2}", bbw_value),
            hurst = format!("{:.4}", hurst_value),
            entropy = format!("{:.4}", entropy_value),
            confidence = format!("{:.2}", confidence),
            "regime detected"
        );

        *self.state.write() = Some(new_state.clone());
        Some(new_state)
    }

    /// Extracts closing prices from `bars` automatically.
    pub fn update(&self, bars: &[Bar]) -> Option<RegimeState> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        self.detect(bars, &closes)
    }

    pub fn current_regime(&self) -> Option<RegimeState> {
        self.state.read().clone()
    }
}

impl Default for RegimeDetector {
    fn default() -> Self {
        Self { state: RwLock::new(None), last_change_time: RwLock::new(Instant::now()) }
    }
}

fn classify(adx: f64, bbw: f64, hurst: f64, entropy: f64) -> (MarketRegime, f64) {
    if entropy >= 0.95 {
        return (MarketRegime::Dead, remap(entropy, 0.95, 1.0, 0.70, 1.0));
    }

    if bbw > 5.0 {
        return (MarketRegime::Volatile, remap(bbw, 5.0, 10.0, 0.65, 1.0));
    }

    if bbw < 1.5 && adx < 20.0 {
        let bbw_conf = remap(bbw, 1.5, 0.5, 0.50, 1.0);
        let adx_conf = remap(adx, 20.0, 5.0, 0.50, 1.0);
        return (MarketRegime::Squeeze, (bbw_conf + adx_conf) / 2.0);
    }

    if adx > 25.0 && hurst > 0.55 {
        let adx_conf = remap(adx, 25.0, 50.0, 0.60, 1.0);
        let hurst_conf = remap(hurst, 0.55, 0.80, 0.60, 1.0);
        return (MarketRegime::Trending, (adx_conf + hurst_conf) / 2.0);
    }

    if adx < 20.0 && hurst < 0.45 {
        let adx_conf = remap(adx, 20.0, 5.0, 0.50, 1.0);
        let hurst_conf = remap(hurst, 0.45, 0.20, 0.50, 1.0);
        return (MarketRegime::Ranging, (adx_conf + hurst_conf) / 2.0);
    }

    trace!(adx, bbw, hurst, entropy, "regime: no rule matched, defaulting to RANGING");
    (MarketRegime::Ranging, 0.30)
}

fn remap(value: f64, in_lo: f64, in_hi: f64, out_lo: f64, out_hi: f64) -> f64 {
    let t = if (in_hi - in_lo).abs() < f64::EPSILON { 0.5 } else { (value - in_lo) / (in_hi - in_lo) };
    let clamped = t.clamp(0.0, 1.0);
    out_lo + clamped * (out_hi - out_lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_dead() {
        let (regime, conf) = classify(30.0, 3.0, 0.50, 0.98);
        assert_eq!(regime, MarketRegime::Dead);
        assert!(conf > 0.0);
    }

    #[test]
    fn test_classify_volatile() {
        assert_eq!(classify(30.0, 7.0, 0.50, 0.50).0, MarketRegime::Volatile);
    }

    #[test]
    fn test_classify_squeeze() {
        assert_eq!(classify(15.0, 1.0, 0.50, 0.50).0, MarketRegime::Squeeze);
    }

    #[test]
    fn test_classify_trending() {
        assert_eq!(classify(35.0, 3.0, 0.65, 0.50).0, MarketRegime::Trending);
    }

    #[test]
    fn test_classify_ranging() {
        assert_eq!(classify(15.0, 3.0, 0.40, 0.50).0, MarketRegime::Ranging);
    }

    #[test]
    fn test_classify_default_ranging() {
        let (regime, conf) = classify(22.0, 3.0, 0.50, 0.50);
        assert_eq!(regime, MarketRegime::Ranging);
        assert!((conf - 0.30).abs() < 1e-10);
    }

    #[test]
    fn test_dead_priority_over_trending() {
        assert_eq!(classify(40.0, 3.0, 0.70, 0.97).0, MarketRegime::Dead);
    }

    #[test]
    fn test_regime_display() {
        assert_eq!(format!("{}", MarketRegime::Trending), "TRENDING");
        assert_eq!(format!("{}", MarketRegime::Dead), "DEAD");
    }

    #[test]
    fn test_remap() {
        assert!((remap(0.5, 0.0, 1.0, 0.0, 10.0) - 5.0).abs() < 1e-10);
        assert!((remap(2.0, 0.0, 1.0, 0.0, 10.0) - 10.0).abs() < 1e-10);
        assert!((remap(-1.0, 0.0, 1.0, 0.0, 10.0) - 0.0).abs() < 1e-10);
    }
}
