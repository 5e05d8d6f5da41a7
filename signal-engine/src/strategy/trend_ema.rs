// =============================================================================
// trend_ema — EMA-9/21/55 stack alignment with ADX confirmation
// =============================================================================
//
// Grounded on the teacher's `ema_trend_aligned` plus the ADX signal leg of
// `StrategyEngine::evaluate_symbol`: only acts when the EMA stack is fully
// aligned *and* ADX confirms a trending market (> `min_adx`).
// =============================================================================

use aurora_core::models::SignalValue;
use aurora_core::AppError;
use serde_json::Value;

use crate::bar::Bar;
use crate::indicators::adx::calculate_adx;
use crate::indicators::ema::ema_trend_aligned;
use crate::strategy::{param_f64, Strategy, StrategyDescriptor};

pub struct TrendEmaStrategy {
    min_adx: f64,
}

impl TrendEmaStrategy {
    pub fn from_params(params: &Value) -> Result<Box<dyn Strategy>, AppError> {
        let min_adx = param_f64(params, "min_adx", 25.0);
        Ok(Box::new(Self { min_adx }))
    }
}

impl Strategy for TrendEmaStrategy {
    fn type_name(&self) -> &'static str {
        "trend_ema"
    }

    fn descriptor(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            name: "EMA Stack Trend Alignment",
            description: "Signals in the direction of a fully aligned EMA-9/21/55 stack, confirmed by ADX.",
            params_schema: serde_json::json!({ "min_adx": {"type": "number", "default": 25.0} }),
        }
    }

    fn evaluate(&mut self, bars: &[Bar]) -> SignalValue {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let Some((is_bullish, _strength)) = ema_trend_aligned(&closes) else {
            return SignalValue::None;
        };

        let adx = calculate_adx(bars, 14).unwrap_or(0.0);
        if adx < self.min_adx {
            return SignalValue::None;
        }

        if is_bullish {
            SignalValue::Long
        } else {
            SignalValue::Short
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64) -> Bar {
        Bar { open_time: 0, close_time: 0, open: close, high: close + 0.5, low: close - 0.5, close, volume: 1.0, is_closed: true }
    }

    #[test]
    fn no_signal_without_enough_history() {
        let mut strategy = TrendEmaStrategy::from_params(&Value::Null).unwrap();
        let bars: Vec<Bar> = (0..20).map(|i| bar(100.0 + i as f64)).collect();
        assert_eq!(strategy.evaluate(&bars), SignalValue::None);
    }

    #[test]
    fn signals_long_on_strong_uptrend() {
        let mut strategy = TrendEmaStrategy::from_params(&Value::Null).unwrap();
        let bars: Vec<Bar> = (0..120).map(|i| bar(100.0 + i as f64 * 2.0)).collect();
        assert_eq!(strategy.evaluate(&bars), SignalValue::Long);
    }
}
