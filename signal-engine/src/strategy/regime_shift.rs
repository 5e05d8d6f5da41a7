// =============================================================================
// regime_shift — trade only in a confirmed TRENDING regime
// =============================================================================
//
// Wraps the full regime detector (ADX + BBW + Hurst + entropy). Signals in
// the trend direction (via EMA-9 vs EMA-21) only while the regime is
// TRENDING and not near-random per the entropy filter; stays flat in every
// other regime. Grounded on `regime::detector::RegimeDetector` and the
// teacher's use of `state.regime_detector` to gate `StrategyEngine`.
// =============================================================================

use aurora_core::models::SignalValue;
use aurora_core::AppError;
use serde_json::Value;

use crate::bar::Bar;
use crate::indicators::ema::calculate_ema;
use crate::regime::detector::{MarketRegime, RegimeDetector};
use crate::strategy::{Strategy, StrategyDescriptor};

pub struct RegimeShiftStrategy {
    detector: std::sync::Arc<RegimeDetector>,
}

impl RegimeShiftStrategy {
    pub fn from_params(_params: &Value) -> Result<Box<dyn Strategy>, AppError> {
        Ok(Box::new(Self { detector: RegimeDetector::new() }))
    }
}

impl Strategy for RegimeShiftStrategy {
    fn type_name(&self) -> &'static str {
        "regime_shift"
    }

    fn descriptor(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            name: "Regime-Gated Trend Following",
            description: "Only signals while the market regime is classified TRENDING; flat otherwise.",
            params_schema: serde_json::json!({}),
        }
    }

    fn evaluate(&mut self, bars: &[Bar]) -> SignalValue {
        let Some(state) = self.detector.update(bars) else {
            return SignalValue::None;
        };

        if state.regime != MarketRegime::Trending {
            return SignalValue::None;
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let ema9 = calculate_ema(&closes, 9);
        let ema21 = calculate_ema(&closes, 21);

        match (ema9.last(), ema21.last()) {
            (Some(&e9), Some(&e21)) if e9 > e21 => SignalValue::Long,
            (Some(&e9), Some(&e21)) if e9 < e21 => SignalValue::Short,
            _ => SignalValue::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64) -> Bar {
        Bar { open_time: 0, close_time: 0, open: close - 0.5, high: close + 1.0, low: close - 1.0, close, volume: 1.0, is_closed: true }
    }

    #[test]
    fn flat_without_enough_history() {
        let mut strategy = RegimeShiftStrategy::from_params(&Value::Null).unwrap();
        let bars: Vec<Bar> = (0..10).map(|i| bar(100.0 + i as f64)).collect();
        assert_eq!(strategy.evaluate(&bars), SignalValue::None);
    }

    #[test]
    fn long_in_strong_uptrend() {
        let mut strategy = RegimeShiftStrategy::from_params(&Value::Null).unwrap();
        let bars: Vec<Bar> = (0..200).map(|i| bar(100.0 + i as f64 * 2.0)).collect();
        assert_eq!(strategy.evaluate(&bars), SignalValue::Long);
    }
}
