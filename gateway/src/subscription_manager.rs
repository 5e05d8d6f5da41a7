// =============================================================================
// Subscription Manager (spec §4.4 / C4)
// =============================================================================
//
// Maintains the two in-memory maps `subscription_key -> {client_ids}` and
// `client_id -> {subscription_keys}`. The maps are the authoritative record
// of *this process's* client interest; `realtime_data.subscribers` only ever
// carries this process's own label (`api-service`), appended once when the
// key transitions 0→1 locally and removed once it transitions 1→0.
//
// Concurrency rule (spec §5): all map mutations are serialized behind one
// lock; the database write that follows a 0→1 / 1→0 transition is ordered
// after the map mutation so a concurrent reader never observes the map out
// of sync with its own writes.
// =============================================================================

use std::collections::{HashMap, HashSet};

use aurora_core::models::source_label;
use parking_lot::Mutex;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;

struct Maps {
    key_to_clients: HashMap<String, HashSet<Uuid>>,
    client_to_keys: HashMap<Uuid, HashSet<String>>,
}

pub struct SubscriptionManager {
    maps: Mutex<Maps>,
    pool: PgPool,
}

impl SubscriptionManager {
    pub fn new(pool: PgPool) -> Self {
        Self {
            maps: Mutex::new(Maps {
                key_to_clients: HashMap::new(),
                client_to_keys: HashMap::new(),
            }),
            pool,
        }
    }

    /// Subscribe `client_id` to every key in `keys`. For each key that
    /// transitions 0→1 clients *in this process*, upsert `realtime_data`
    /// appending this process's subscriber label — that write is what fires
    /// `subscription.add` and wakes the exchange worker.
    pub async fn subscribe(&self, client_id: Uuid, data_type_by_key: &[(String, String)]) {
        let mut newly_first: Vec<(String, String)> = Vec::new();

        {
            let mut maps = self.maps.lock();
            for (key, data_type) in data_type_by_key {
                let clients = maps.key_to_clients.entry(key.clone()).or_default();
                let was_empty = clients.is_empty();
                clients.insert(client_id);
                maps.client_to_keys
                    .entry(client_id)
                    .or_default()
                    .insert(key.clone());
                if was_empty {
                    newly_first.push((key.clone(), data_type.clone()));
                }
            }
        }

        for (key, data_type) in &newly_first {
            if let Err(e) = db::append_subscriber(&self.pool, key, data_type, source_label::API_SERVICE).await {
                warn!(error = %e, key = %key, "failed to upsert realtime_data on subscribe");
            }
        }
    }

    /// Unsubscribe `client_id` from every key in `keys`. Mirrors
    /// [`subscribe`]: a 1→0 transition removes this process's label from
    /// `realtime_data`, deleting the row if that was the last subscriber.
    pub async fn unsubscribe(&self, client_id: Uuid, keys: &[String]) {
        let mut now_empty: Vec<String> = Vec::new();

        {
            let mut maps = self.maps.lock();
            for key in keys {
                if let Some(clients) = maps.key_to_clients.get_mut(key) {
                    clients.remove(&client_id);
                    if clients.is_empty() {
                        maps.key_to_clients.remove(key);
                        now_empty.push(key.clone());
                    }
                }
                if let Some(client_keys) = maps.client_to_keys.get_mut(&client_id) {
                    client_keys.remove(key);
                }
            }
        }

        for key in &now_empty {
            if let Err(e) = db::remove_subscriber(&self.pool, key, source_label::API_SERVICE).await {
                warn!(error = %e, key = %key, "failed to remove subscriber label on unsubscribe");
            }
        }
    }

    /// Treat a disconnect as unsubscribing from every key the client held.
    pub async fn disconnect(&self, client_id: Uuid) {
        let keys: Vec<String> = {
            let maps = self.maps.lock();
            maps.client_to_keys
                .get(&client_id)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default()
        };
        self.unsubscribe(client_id, &keys).await;
        self.maps.lock().client_to_keys.remove(&client_id);
    }

    /// The set of client ids currently subscribed to `key`.
    pub fn subscribers_of(&self, key: &str) -> Vec<Uuid> {
        self.maps
            .lock()
            .key_to_clients
            .get(key)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The set of keys `client_id` currently holds (answers `GET_SUBSCRIPTIONS`).
    pub fn keys_of(&self, client_id: Uuid) -> Vec<String> {
        self.maps
            .lock()
            .client_to_keys
            .get(&client_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Process startup (spec §4.4): clear this process's own subscriber
    /// label from every `realtime_data` row — rows where it was the sole
    /// subscriber are deleted, rows shared with another service just drop
    /// the label — then emit an explicit `subscription.clean` so the
    /// exchange worker resets its upstream connection. A scoped DELETE is
    /// used deliberately instead of a blanket TRUNCATE so other services'
    /// subscriptions (e.g. `signal-service`) survive a gateway restart.
    pub async fn startup_cleanup(&self) -> Result<(), sqlx::Error> {
        let affected = db::clear_own_subscriber_label(&self.pool, source_label::API_SERVICE).await?;
        info!(affected, "cleared api-service subscriber label on startup");
        db::notify_subscription_clean(&self.pool).await?;
        Ok(())
    }
}
