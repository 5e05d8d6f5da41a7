// =============================================================================
// Strategy trait + registry (spec §4.9a)
// =============================================================================
//
// The teacher's `StrategyEngine` is a single hand-coded ensemble
// (`evaluate_symbol` in `strategy.rs`) baked into one struct. This system
// needs many independently configurable strategies selected per alert by
// `alert_configs.strategy_type`, so the ensemble is split into a `Strategy`
// trait with one implementation per `strategy_type` string, and a registry
// populated by explicit `register()` calls at startup — no reflection, no
// inventory/linkme collection, just a lookup table built once in `main.rs`.
// =============================================================================

pub mod momentum_rsi;
pub mod regime_shift;
pub mod trend_ema;
pub mod volatility_breakout;

use std::collections::HashMap;

use aurora_core::models::SignalValue;
use aurora_core::AppError;
use serde_json::Value;

use crate::bar::Bar;

/// Static metadata describing a strategy, persisted into
/// `alert_strategy_metadata` so API consumers can discover available
/// strategies and their configurable parameters.
#[derive(Debug, Clone)]
pub struct StrategyDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params_schema: Value,
}

/// A strategy evaluates a contiguous run of bars into a signal value.
///
/// Implementations may carry internal state across calls (e.g. a cached
/// regime detector) — `evaluate` takes `&mut self` for that reason, but the
/// bars slice is always the full admitted window; strategies do not rely on
/// being called on every bar.
pub trait Strategy: Send {
    fn type_name(&self) -> &'static str;
    fn descriptor(&self) -> StrategyDescriptor;
    fn evaluate(&mut self, bars: &[Bar]) -> SignalValue;
}

type Factory = Box<dyn Fn(&Value) -> Result<Box<dyn Strategy>, AppError> + Send + Sync>;

/// Lookup table from `strategy_type` to a constructor. Strategies register
/// themselves explicitly via [`StrategyRegistry::register`] at startup.
pub struct StrategyRegistry {
    factories: HashMap<&'static str, Factory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register<F>(&mut self, type_name: &'static str, factory: F)
    where
        F: Fn(&Value) -> Result<Box<dyn Strategy>, AppError> + Send + Sync + 'static,
    {
        self.factories.insert(type_name, Box::new(factory));
    }

    pub fn instantiate(&self, strategy_type: &str, params: &Value) -> Result<Box<dyn Strategy>, AppError> {
        let factory = self
            .factories
            .get(strategy_type)
            .ok_or_else(|| AppError::Validation(format!("unknown strategy_type '{strategy_type}'")))?;
        factory(params)
    }

    /// Descriptors for every registered strategy, in registration order is
    /// not guaranteed (HashMap) — callers sort by `strategy_type` if a
    /// stable listing order matters.
    pub fn all_descriptors(&self) -> Vec<(&'static str, StrategyDescriptor)> {
        self.factories
            .iter()
            .filter_map(|(type_name, factory)| {
                factory(&Value::Null).ok().map(|s| (*type_name, s.descriptor()))
            })
            .collect()
    }

    /// Populate the registry with every built-in strategy. Called once from
    /// `main.rs` at startup.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("momentum_rsi", |params| momentum_rsi::MomentumRsiStrategy::from_params(params));
        registry.register("trend_ema", |params| trend_ema::TrendEmaStrategy::from_params(params));
        registry.register("volatility_breakout", |params| {
            volatility_breakout::VolatilityBreakoutStrategy::from_params(params)
        });
        registry.register("regime_shift", |params| regime_shift::RegimeShiftStrategy::from_params(params));
        registry
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a numeric param with a default, tolerating a missing or
/// non-numeric `params` object rather than failing strategy construction.
pub(crate) fn param_f64(params: &Value, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

pub(crate) fn param_u64(params: &Value, key: &str, default: u64) -> u64 {
    params.get(key).and_then(Value::as_u64).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_strategy_type_is_rejected() {
        let registry = StrategyRegistry::with_builtins();
        assert!(registry.instantiate("does_not_exist", &Value::Null).is_err());
    }

    #[test]
    fn builtins_all_instantiate_with_default_params() {
        let registry = StrategyRegistry::with_builtins();
        for type_name in ["momentum_rsi", "trend_ema", "volatility_breakout", "regime_shift"] {
            assert!(registry.instantiate(type_name, &Value::Null).is_ok());
        }
    }

    #[test]
    fn param_helpers_fall_back_to_defaults() {
        assert_eq!(param_f64(&Value::Null, "x", 1.5), 1.5);
        assert_eq!(param_u64(&Value::Null, "x", 14), 14);
    }
}
