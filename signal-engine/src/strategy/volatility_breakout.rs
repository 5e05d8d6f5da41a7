// =============================================================================
// volatility_breakout — Bollinger Band breakout strategy
// =============================================================================
//
// Long when the last close breaks above the upper band, short when it
// breaks below the lower band. Grounded on the Bollinger signal leg of the
// teacher's `StrategyEngine::evaluate_symbol`.
// =============================================================================

use aurora_core::models::SignalValue;
use aurora_core::AppError;
use serde_json::Value;

use crate::bar::Bar;
use crate::indicators::bollinger::calculate_bollinger;
use crate::strategy::{param_f64, param_u64, Strategy, StrategyDescriptor};

pub struct VolatilityBreakoutStrategy {
    period: usize,
    num_std: f64,
}

impl VolatilityBreakoutStrategy {
    pub fn from_params(params: &Value) -> Result<Box<dyn Strategy>, AppError> {
        let period = param_u64(params, "period", 20) as usize;
        let num_std = param_f64(params, "num_std", 2.0);
        if period == 0 {
            return Err(AppError::Validation("volatility_breakout: period must be > 0".into()));
        }
        Ok(Box::new(Self { period, num_std }))
    }
}

impl Strategy for VolatilityBreakoutStrategy {
    fn type_name(&self) -> &'static str {
        "volatility_breakout"
    }

    fn descriptor(&self) -> StrategyDescriptor {
        StrategyDescriptor {
            name: "Bollinger Band Breakout",
            description: "Signals when price closes outside the Bollinger Bands.",
            params_schema: serde_json::json!({
                "period": {"type": "integer", "default": 20},
                "num_std": {"type": "number", "default": 2.0},
            }),
        }
    }

    fn evaluate(&mut self, bars: &[Bar]) -> SignalValue {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let Some(bands) = calculate_bollinger(&closes, self.period, self.num_std) else {
            return SignalValue::None;
        };
        let Some(&last_close) = closes.last() else {
            return SignalValue::None;
        };

        if last_close > bands.upper {
            SignalValue::Long
        } else if last_close < bands.lower {
            SignalValue::Short
        } else {
            SignalValue::None
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
    fn signals_long_on_upside_breakout() {
        let mut strategy = VolatilityBreakoutStrategy::from_params(&Value::Null).unwrap();
        let mut bars: Vec<Bar> = vec![bar(100.0); 20];
        bars.push(bar(200.0));
        assert_eq!(strategy.evaluate(&bars), SignalValue::Long);
    }

    #[test]
    fn no_signal_inside_the_bands() {
        let mut strategy = VolatilityBreakoutStrategy::from_params(&Value::Null).unwrap();
        let bars: Vec<Bar> = (0..25).map(|i| bar(100.0 + (i % 3) as f64)).collect();
        assert_eq!(strategy.evaluate(&bars), SignalValue::None);
    }
}
