// =============================================================================
// momentum_rsi — RSI mean-reversion strategy
// =============================================================================
//
// Long when RSI drops below `oversold`, short when it rises above
// `overbought`, none otherwise. Grounded on the RSI signal leg of the
// teacher's `StrategyEngine::evaluate_symbol` ensemble.
// =============================================================================

use aurora_core::models::SignalValue;
use aurora_core::AppError;
use serde_json::Value;

use crate::bar::Bar;
use crate::indicators::rsi::current_rsi;
use crate::strategy::{param_f64, param_u64, Strategy, StrategyDescriptor};

pub struct MomentumRsiStrategy {
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl MomentumRsiStrategy {
    pub fn from_params(params: &Value) -> Result<Box<dyn Strategy>, AppError> {
        let period = param_u64(params, "period", 14) as usize;
        let oversold = param_f64(params, "oversold", 30.0);
        let overbought = param_f64(params, "overbought", 70.0);
        if period == 0 {
            return Err(AppError::Validation("momentum_rsi: period must be > 0".into()));
        }
        Ok(Box::new(Self { period, oversold, overbought }))
    }
}

impl Strategy for MomentumRsiStrategy {
    fn type_name(&self) -> &'static str {
        "momentum_rsi"
    }

    fn descriptor(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            name: "RSI Momentum Reversal",
            description: "Signals long below an oversold RSI threshold and short above an overbought one.",
            params_schema: serde_json::json!({
                "period": {"type": "integer", "default": 14},
                "oversold": {"type": "number", "default": 30.0},
                "overbought": {"type": "number", "default": 70.0},
            }),
        }
    }

    fn evaluate(&mut self, bars: &[Bar]) -> SignalValue {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        match current_rsi(&closes, self.period) {
            Some((value, _)) if value <= self.oversold => SignalValue::Long,
            Some((value, _)) if value >= self.overbought => SignalValue::Short,
            _ => SignalValue::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(close: f64) -> Bar {
        Bar { open_time: 0, close_time: 0, open: close, high: close, low: close, close, volume: 1.0, is_closed: true }
    }

    #[test]
    fn signals_long_after_strong_downtrend() {
        let mut strategy = MomentumRsiStrategy::from_params(&Value::Null).unwrap();
        let bars: Vec<Bar> = (0..30).rev().map(|i| bar(100.0 + i as f64)).collect();
        assert_eq!(strategy.evaluate(&bars), SignalValue::Long);
    }

    #[test]
    fn signals_short_after_strong_uptrend() {
        let mut strategy = MomentumRsiStrategy::from_params(&Value::Null).unwrap();
        let bars: Vec<Bar> = (0..30).map(|i| bar(100.0 + i as f64)).collect();
        assert_eq!(strategy.evaluate(&bars), SignalValue::Short);
    }

    #[test]
    fn rejects_zero_period() {
        assert!(MomentumRsiStrategy::from_params(&serde_json::json!({"period": 0})).is_err());
    }
}
