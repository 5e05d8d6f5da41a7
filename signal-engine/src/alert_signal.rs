// =============================================================================
// AlertSignal — the engine's live binding of one `alert_configs` row to an
// instantiated strategy and its trigger bookkeeping (spec §4.9)
// =============================================================================

use chrono::{DateTime, Utc};

use aurora_core::models::AlertConfigRow;

use crate::strategy::Strategy;

/// Per-alert state carried between evaluations. `last_kline_close_time` and
/// `last_minute_evaluated` are what the `each_kline_close` / `each_minute`
/// trigger rules check against before re-running the strategy.
pub struct AlertSignal {
    pub config: AlertConfigRow,
    pub strategy: Box<dyn Strategy>,
    pub fired_once: bool,
    pub last_kline_close_time: Option<i64>,
    pub last_minute_evaluated: Option<DateTime<Utc>>,
}

impl AlertSignal {
    pub fn new(config: AlertConfigRow, strategy: Box<dyn Strategy>) -> Self {
        Self {
            config,
            strategy,
            fired_once: false,
            last_kline_close_time: None,
            last_minute_evaluated: None,
        }
    }

    /// The subscription key this alert watches (spec §6 grammar, kline form).
    pub fn subscription_key(&self) -> String {
        format!("BINANCE:{}@KLINE_{}", self.config.symbol, self.config.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyRegistry;

    fn config() -> AlertConfigRow {
        AlertConfigRow {
            id: uuid::Uuid::nil(),
            name: "test".into(),
            description: None,
            strategy_type: "momentum_rsi".into(),
            symbol: "BTCUSDT".into(),
            interval: "60".into(),
            trigger_type: "each_kline_close".into(),
            params: serde_json::json!({}),
            enabled: true,
            owner: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn subscription_key_follows_kline_grammar() {
        let registry = StrategyRegistry::with_builtins();
        let cfg = config();
        let strategy = registry.instantiate(&cfg.strategy_type, &cfg.params).unwrap();
        let alert = AlertSignal::new(cfg, strategy);
        assert_eq!(alert.subscription_key(), "BINANCE:BTCUSDT@KLINE_60");
    }

    #[test]
    fn starts_with_no_trigger_history() {
        let registry = StrategyRegistry::with_builtins();
        let cfg = config();
        let strategy = registry.instantiate(&cfg.strategy_type, &cfg.params).unwrap();
        let alert = AlertSignal::new(cfg, strategy);
        assert!(!alert.fired_once);
        assert!(alert.last_kline_close_time.is_none());
    }
}
