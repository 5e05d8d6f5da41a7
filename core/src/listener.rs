// =============================================================================
// Notification Listener (spec §4.2 / C2)
// =============================================================================
//
// A dedicated connection, never drawn from the query pool, that LISTENs the
// union of channels a process cares about and decodes each payload into a
// `NotificationEnvelope`. On connection loss it reconnects with capped
// exponential backoff and re-issues every `LISTEN`. It never replays missed
// notifications — per spec §4.2 and §7, consumers reconcile via state
// tables, not via the notification stream.
//
// Shaped after the teacher's stream-reconnect loops (`market_data::
// candle_buffer::run_kline_stream`, driven from `main.rs` with a `loop {
// ...; sleep(5s) }` wrapper) but generalized into the retry logic itself
// rather than leaving it to the caller, since every one of Aurora's three
// binaries needs the identical behavior.
// =============================================================================

use std::time::Duration;

use sqlx::postgres::PgListener;
use tracing::{error, info, warn};

use crate::envelope::{Channel, NotificationEnvelope};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct Listener {
    database_url: String,
    channels: Vec<&'static str>,
    inner: PgListener,
}

impl Listener {
    /// Connect and `LISTEN` on every channel in `channels`.
    pub async fn connect(database_url: &str, channels: &[Channel]) -> Result<Self, sqlx::Error> {
        let channel_names: Vec<&'static str> = channels.iter().map(|c| c.as_str()).collect();
        let mut inner = PgListener::connect(database_url).await?;
        inner.listen_all(channel_names.iter().copied()).await?;
        info!(channels = ?channel_names, "notification listener connected");
        Ok(Self {
            database_url: database_url.to_string(),
            channels: channel_names,
            inner,
        })
    }

    /// Receive the next notification, decoded into an envelope. Transparently
    /// reconnects (with capped exponential backoff) on connection loss and
    /// re-issues every `LISTEN` before returning to the caller — the caller
    /// never sees the disconnect, only a possible gap in delivery.
    pub async fn recv(&mut self) -> NotificationEnvelope {
        loop {
            match self.inner.recv().await {
                Ok(notification) => match NotificationEnvelope::parse(notification.payload()) {
                    Ok(env) => return env,
                    Err(e) => {
                        warn!(error = %e, payload = notification.payload(), "dropping malformed notification payload");
                        continue;
                    }
                },
                Err(e) => {
                    error!(error = %e, "notification listener connection lost — reconnecting");
                    self.reconnect_with_backoff().await;
                }
            }
        }
    }

    async fn reconnect_with_backoff(&mut self) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            tokio::time::sleep(backoff).await;
            match PgListener::connect(&self.database_url).await {
                Ok(mut fresh) => match fresh.listen_all(self.channels.iter().copied()).await {
                    Ok(()) => {
                        info!(channels = ?self.channels, "notification listener reconnected");
                        self.inner = fresh;
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "LISTEN re-subscription failed after reconnect — retrying");
                    }
                },
                Err(e) => {
                    warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "reconnect attempt failed");
                }
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }
}
