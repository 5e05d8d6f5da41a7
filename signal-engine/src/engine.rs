// =============================================================================
// Engine — the signal engine's in-memory runtime (spec §4.9)
// =============================================================================
//
// Owns the four maps the spec names (`alerts`, `alertsByKey`, `klineCache`,
// `locks`) and the transitions between them: startup-per-alert, the
// realtime.update gap-classification/evaluation pipeline, and alert_config
// change handling. Map mutation is a short `parking_lot::Mutex` critical
// section, same idiom as the gateway's `SubscriptionManager`; the per-key
// repair lock is a `tokio::sync::Mutex` instead, since fill-repair holds it
// across awaits.
// =============================================================================

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sqlx::PgPool;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{info, warn};
use uuid::Uuid;

use aurora_core::envelope::RealtimeUpdateData;
use aurora_core::models::{trigger_type, AlertConfigRow, SignalValue, StrategyMetadataRow};
use aurora_core::subscription_key::SubscriptionKey;

use crate::admission;
use crate::alert_signal::AlertSignal;
use crate::bar::{bar_from_tick, Bar};
use crate::db;
use crate::fill_loop::{self, TaskOutcome};
use crate::interval_width::interval_width_ms;
use crate::kline_cache::KlineCache;
use crate::strategy::StrategyRegistry;

struct Maps {
    alerts: HashMap<Uuid, AlertSignal>,
    alerts_by_key: HashMap<String, HashSet<Uuid>>,
    kline_cache: HashMap<String, KlineCache>,
}

pub struct Engine {
    pool: PgPool,
    registry: StrategyRegistry,
    maps: Mutex<Maps>,
    repair_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    task_events: broadcast::Sender<TaskOutcome>,
}

fn kline_key(symbol: &str, interval: &str) -> String {
    format!("BINANCE:{symbol}@KLINE_{interval}")
}

impl Engine {
    pub fn new(pool: PgPool, registry: StrategyRegistry) -> Self {
        let (task_events, _) = broadcast::channel(256);
        Self {
            pool,
            registry,
            maps: Mutex::new(Maps {
                alerts: HashMap::new(),
                alerts_by_key: HashMap::new(),
                kline_cache: HashMap::new(),
            }),
            repair_locks: Mutex::new(HashMap::new()),
            task_events,
        }
    }

    /// Feed `task.completed`/`task.failed` notifications in from the
    /// listener-dispatch loop so any in-flight fill loop can stop waiting.
    pub fn handle_task_outcome(&self, outcome: TaskOutcome) {
        let _ = self.task_events.send(outcome);
    }

    /// Startup (spec §4.9): clear our own stale subscriber label, publish the
    /// strategy registry, then run the startup sequence for every enabled
    /// alert.
    pub async fn bootstrap(&self) -> Result<(), sqlx::Error> {
        let cleared = db::clear_own_subscriber_label(&self.pool).await?;
        info!(affected = cleared, "cleared signal-service subscriber label on startup");

        for (strategy_type, descriptor) in self.registry.all_descriptors() {
            let row = StrategyMetadataRow {
                strategy_type: strategy_type.to_string(),
                name: descriptor.name.to_string(),
                description: descriptor.description.to_string(),
                params_schema: descriptor.params_schema.clone(),
            };
            if let Err(e) = db::upsert_strategy_metadata(&self.pool, &row).await {
                warn!(error = %e, strategy_type, "failed to upsert strategy metadata");
            }
        }

        let configs = db::list_enabled_alert_configs(&self.pool).await?;
        for config in configs {
            self.start_alert(config).await;
        }
        Ok(())
    }

    /// Startup-per-alert sequence (spec §4.9 "Startup per alert"), also
    /// reused whenever `alert_config.new` arrives or an update re-enables an
    /// alert.
    async fn start_alert(&self, config: AlertConfigRow) {
        let strategy = match self.registry.instantiate(&config.strategy_type, &config.params) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, alert_id = %config.id, strategy_type = %config.strategy_type, "failed to instantiate strategy, skipping alert");
                return;
            }
        };

        let key = kline_key(&config.symbol, &config.interval);
        let alert_id = config.id;

        if let Err(e) = db::append_subscriber(&self.pool, &key, "KLINE").await {
            warn!(error = %e, key = %key, "failed to upsert realtime_data on alert startup");
        }

        let already_cached = { self.maps.lock().kline_cache.contains_key(&key) };
        if !already_cached {
            let required = admission::REQUIRED_KLINES;
            let mut bars: Vec<Bar> = db::klines_tail(&self.pool, &config.symbol, &config.interval, required as i64 * 2)
                .await
                .map(|rows| rows.into_iter().map(Bar::from).collect())
                .unwrap_or_default();

            if !admission::is_admissible(&bars) {
                bars = fill_loop::backfill_until_ready(&self.pool, &config.symbol, &config.interval, required, self.task_events.subscribe()).await;
            }

            self.maps.lock().kline_cache.insert(key.clone(), KlineCache::from_history(bars));
        }

        let mut maps = self.maps.lock();
        maps.alerts_by_key.entry(key.clone()).or_default().insert(alert_id);
        maps.alerts.insert(alert_id, AlertSignal::new(config, strategy));
    }

    /// `realtime.update` (spec §4.9 "Runtime on each realtime.update").
    pub async fn handle_realtime_update(&self, data: RealtimeUpdateData) {
        if data.data_type != "KLINE" {
            return;
        }
        let Some(bar) = bar_from_tick(&data.data) else {
            return;
        };
        let Some(width) = SubscriptionKey::parse(&data.subscription_key)
            .and_then(|k| k.interval)
            .and_then(|iv| interval_width_ms(&iv))
        else {
            return;
        };

        let lock = self.repair_lock_for(&data.subscription_key);
        let Ok(_guard) = lock.try_lock() else {
            return;
        };

        let last_time = {
            self.maps
                .lock()
                .kline_cache
                .get(&data.subscription_key)
                .and_then(|c| c.last())
                .map(|b| b.open_time)
        };
        let gap = last_time.map(|t| bar.open_time - t).unwrap_or(0);

        if gap == 0 {
            self.maps
                .lock()
                .kline_cache
                .entry(data.subscription_key.clone())
                .or_default()
                .update_last(bar);
        } else if gap == width {
            self.maps
                .lock()
                .kline_cache
                .entry(data.subscription_key.clone())
                .or_default()
                .append(bar, admission::REQUIRED_KLINES * 2);
        } else if gap as f64 > width as f64 * 1.5 {
            let Some(parsed) = SubscriptionKey::parse(&data.subscription_key) else {
                return;
            };
            let Some(interval) = parsed.interval else {
                return;
            };
            let bars = fill_loop::backfill_until_ready(&self.pool, &parsed.symbol, &interval, admission::REQUIRED_KLINES, self.task_events.subscribe()).await;
            self.maps.lock().kline_cache.insert(data.subscription_key.clone(), KlineCache::from_history(bars));
        } else {
            return;
        }

        self.evaluate_alerts_for_key(&data.subscription_key, &bar, data.event_time).await;
    }

    async fn evaluate_alerts_for_key(&self, key: &str, bar: &Bar, now: DateTime<Utc>) {
        let mut to_persist: Vec<(Uuid, String, String, String, String, SignalValue)> = Vec::new();
        let mut to_disable: Vec<Uuid> = Vec::new();

        {
            let mut maps = self.maps.lock();
            let cache_bars: Vec<Bar> = maps.kline_cache.get(key).map(|c| c.bars().to_vec()).unwrap_or_default();
            let Some(alert_ids) = maps.alerts_by_key.get(key).cloned() else {
                return;
            };

            for id in alert_ids {
                let Some(alert) = maps.alerts.get_mut(&id) else {
                    continue;
                };
                if !alert.config.enabled {
                    continue;
                }
                if !trigger_due(alert, bar, now) {
                    continue;
                }

                let signal = alert.strategy.evaluate(&cache_bars);

                if alert.config.trigger_type == trigger_type::ONCE_ONLY {
                    alert.fired_once = true;
                    to_disable.push(id);
                }

                if signal != SignalValue::None {
                    to_persist.push((
                        id,
                        alert.config.strategy_type.clone(),
                        alert.config.symbol.clone(),
                        alert.config.interval.clone(),
                        alert.config.trigger_type.clone(),
                        signal,
                    ));
                }
            }
        }

        for (id, strategy_type, symbol, interval, trigger, signal) in to_persist {
            if let Err(e) = db::insert_signal(&self.pool, id, &strategy_type, &symbol, &interval, &trigger, signal.as_str(), None).await {
                warn!(error = %e, alert_id = %id, "failed to persist signal");
            }
        }
        for id in to_disable {
            if let Err(e) = db::disable_alert_config(&self.pool, id).await {
                warn!(error = %e, alert_id = %id, "failed to disable once_only alert");
            }
        }
    }

    /// `alert_config.new`. The notification already carries the full row
    /// (the trigger emits `to_jsonb(row_data)`), so there is no database
    /// round trip here.
    pub async fn handle_alert_config_new(&self, config: AlertConfigRow) {
        if config.enabled {
            self.start_alert(config).await;
        }
    }

    /// `alert_config.update` (spec §4.9 "Alert config changes"). Built
    /// entirely from the notification payload — no secondary database
    /// query (spec.md Scenario 6).
    pub async fn handle_alert_config_update(&self, new_row: AlertConfigRow) {
        let id = new_row.id;
        let only_enabled_changed = {
            let maps = self.maps.lock();
            maps.alerts.get(&id).map(|a| config_equal_ignoring_enabled(&a.config, &new_row))
        };

        match only_enabled_changed {
            None => {
                if new_row.enabled {
                    self.start_alert(new_row).await;
                }
            }
            Some(true) => {
                let mut maps = self.maps.lock();
                if let Some(alert) = maps.alerts.get_mut(&id) {
                    alert.config.enabled = new_row.enabled;
                    alert.config.updated_at = new_row.updated_at;
                }
            }
            Some(false) => {
                let key_changed = {
                    let maps = self.maps.lock();
                    maps.alerts.get(&id).map(|a| a.subscription_key() != kline_key(&new_row.symbol, &new_row.interval))
                };

                match key_changed {
                    // Symbol/interval unchanged: smart-rebuild in place. Destroy
                    // and reconstruct the `AlertSignal` from the payload alone,
                    // preserving the existing subscription and cache entry —
                    // no `alerts_by_key`/`kline_cache` touch, no subscriber churn.
                    Some(false) => {
                        let strategy = match self.registry.instantiate(&new_row.strategy_type, &new_row.params) {
                            Ok(s) => s,
                            Err(e) => {
                                warn!(error = %e, alert_id = %id, strategy_type = %new_row.strategy_type, "failed to instantiate strategy on update, leaving prior alert in place");
                                return;
                            }
                        };
                        self.maps.lock().alerts.insert(id, AlertSignal::new(new_row, strategy));
                    }
                    // Symbol/interval changed (spec §4.9 "when symbol or
                    // interval changes"): the subscription key itself moves,
                    // so the old key's entry is torn down and a fresh one is
                    // built for the new key.
                    Some(true) => {
                        self.remove_alert(id).await;
                        if new_row.enabled {
                            self.start_alert(new_row).await;
                        }
                    }
                    None => {
                        if new_row.enabled {
                            self.start_alert(new_row).await;
                        }
                    }
                }
            }
        }
    }

    /// `alert_config.delete`.
    pub async fn handle_alert_config_delete(&self, id: Uuid) {
        self.remove_alert(id).await;
    }

    async fn remove_alert(&self, id: Uuid) {
        let cleanup_key = {
            let mut maps = self.maps.lock();
            match maps.alerts.remove(&id) {
                Some(alert) => {
                    let key = alert.subscription_key();
                    let mut now_empty = false;
                    if let Some(set) = maps.alerts_by_key.get_mut(&key) {
                        set.remove(&id);
                        if set.is_empty() {
                            maps.alerts_by_key.remove(&key);
                            maps.kline_cache.remove(&key);
                            now_empty = true;
                        }
                    }
                    if now_empty {
                        Some(key)
                    } else {
                        None
                    }
                }
                None => None,
            }
        };

        if let Some(key) = cleanup_key {
            if let Err(e) = db::remove_subscriber(&self.pool, &key).await {
                warn!(error = %e, key = %key, "failed to remove subscriber label on alert removal");
            }
        }
    }

    fn repair_lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.repair_locks.lock().entry(key.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }
}

fn trigger_due(alert: &mut AlertSignal, bar: &Bar, now: DateTime<Utc>) -> bool {
    match alert.config.trigger_type.as_str() {
        trigger_type::EACH_KLINE_CLOSE => bar.is_closed,
        trigger_type::EACH_KLINE => true,
        trigger_type::EACH_MINUTE => {
            let due = alert
                .last_minute_evaluated
                .map_or(true, |t| now.signed_duration_since(t) >= chrono::Duration::minutes(1));
            if due {
                alert.last_minute_evaluated = Some(now);
            }
            due
        }
        trigger_type::ONCE_ONLY => !alert.fired_once,
        _ => false,
    }
}

/// Every column except `enabled`/`updated_at` — a match means the update was
/// solely a toggle (spec §4.9).
fn config_equal_ignoring_enabled(a: &AlertConfigRow, b: &AlertConfigRow) -> bool {
    a.name == b.name
        && a.description == b.description
        && a.strategy_type == b.strategy_type
        && a.symbol == b.symbol
        && a.interval == b.interval
        && a.trigger_type == b.trigger_type
        && a.params == b.params
        && a.owner == b.owner
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(trigger: &str) -> AlertConfigRow {
        AlertConfigRow {
            id: Uuid::nil(),
            name: "n".into(),
            description: None,
            strategy_type: "momentum_rsi".into(),
            symbol: "BTCUSDT".into(),
            interval: "60".into(),
            trigger_type: trigger.into(),
            params: serde_json::json!({}),
            enabled: true,
            owner: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn bar(is_closed: bool) -> Bar {
        Bar { open_time: 0, close_time: 0, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0, is_closed }
    }

    fn alert(trigger: &str) -> AlertSignal {
        let registry = StrategyRegistry::with_builtins();
        let cfg = config(trigger);
        let strategy = registry.instantiate(&cfg.strategy_type, &cfg.params).unwrap();
        AlertSignal::new(cfg, strategy)
    }

    #[test]
    fn each_kline_close_only_fires_on_closed_bars() {
        let mut a = alert(trigger_type::EACH_KLINE_CLOSE);
        assert!(!trigger_due(&mut a, &bar(false), Utc::now()));
        assert!(trigger_due(&mut a, &bar(true), Utc::now()));
    }

    #[test]
    fn each_kline_always_fires() {
        let mut a = alert(trigger_type::EACH_KLINE);
        assert!(trigger_due(&mut a, &bar(false), Utc::now()));
    }

    #[test]
    fn once_only_fires_exactly_once() {
        let mut a = alert(trigger_type::ONCE_ONLY);
        assert!(trigger_due(&mut a, &bar(true), Utc::now()));
        a.fired_once = true;
        assert!(!trigger_due(&mut a, &bar(true), Utc::now()));
    }

    #[test]
    fn each_minute_throttles_to_once_per_minute() {
        let mut a = alert(trigger_type::EACH_MINUTE);
        let t0 = Utc::now();
        assert!(trigger_due(&mut a, &bar(false), t0));
        assert!(!trigger_due(&mut a, &bar(false), t0 + chrono::Duration::seconds(10)));
        assert!(trigger_due(&mut a, &bar(false), t0 + chrono::Duration::minutes(2)));
    }

    #[test]
    fn config_equal_ignoring_enabled_detects_toggle_only_change() {
        let a = config(trigger_type::EACH_KLINE);
        let mut b = a.clone();
        b.enabled = false;
        assert!(config_equal_ignoring_enabled(&a, &b));
        b.symbol = "ETHUSDT".into();
        assert!(!config_equal_ignoring_enabled(&a, &b));
    }
}
