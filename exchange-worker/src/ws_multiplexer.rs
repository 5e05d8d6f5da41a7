// =============================================================================
// Upstream market-data WebSocket multiplexer (spec §4.8 "One upstream
// market-data WebSocket" / state machine)
// =============================================================================
//
// One connection carries every public subscription. Subscribe/unsubscribe
// intents land in a coalescing queue and get flushed as a single upstream
// SUBSCRIBE/UNSUBSCRIBE call on a ~250 ms batching window, rather than one
// frame per key — the same "coalesce bursts, flush on a timer" shape as the
// teacher's `push_interval` in `api/ws.rs`, applied to outbound subscription
// frames instead of outbound snapshots.
//
// Reconnect is the teacher's `run_kline_stream` retry idiom generalized into
// an explicit state machine per spec §4.8's "disconnected → connecting → up
// → degraded → disconnected".
// =============================================================================

use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const BATCH_WINDOW: Duration = Duration::from_millis(250);
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Up = 2,
    Degraded = 3,
}

pub struct ConnectionStateTracker(AtomicU8);

impl ConnectionStateTracker {
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    pub fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Relaxed);
    }

    pub fn get(&self) -> ConnectionState {
        match self.0.load(Ordering::Relaxed) {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Up,
            3 => ConnectionState::Degraded,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// A pending subscribe or unsubscribe intent, queued for the next batch flush.
pub enum Intent {
    Subscribe(String),
    Unsubscribe(String),
}

/// One inbound tick frame, handed to the tick handler for processing.
pub struct Tick {
    pub stream: String,
    pub payload: serde_json::Value,
}

pub struct Multiplexer {
    stream_base_url: String,
    intent_tx: mpsc::UnboundedSender<Intent>,
    intent_rx: Mutex<Option<mpsc::UnboundedReceiver<Intent>>>,
    pub state: Arc<ConnectionStateTracker>,
    reconnect: tokio::sync::Notify,
}

impl Multiplexer {
    pub fn new(stream_base_url: impl Into<String>) -> Self {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        Self {
            stream_base_url: stream_base_url.into(),
            intent_tx,
            intent_rx: Mutex::new(Some(intent_rx)),
            state: Arc::new(ConnectionStateTracker::new()),
            reconnect: tokio::sync::Notify::new(),
        }
    }

    pub fn queue_subscribe(&self, stream: String) {
        let _ = self.intent_tx.send(Intent::Subscribe(stream));
    }

    pub fn queue_unsubscribe(&self, stream: String) {
        let _ = self.intent_tx.send(Intent::Unsubscribe(stream));
    }

    /// Drop the current connection and rebuild the subscription set from
    /// scratch — used on `subscription.clean` (spec §4.8).
    pub fn force_reconnect(&self) {
        self.reconnect.notify_one();
    }

    /// Run the connect/reconnect loop forever, delivering ticks to `on_tick`
    /// and resubscribing from `full_resubscribe` (a DB query callback) after
    /// every reconnect and on `subscription.clean`.
    pub async fn run<F, R, RFut>(&self, mut on_tick: F, mut full_resubscribe: R)
    where
        F: FnMut(Tick) + Send,
        R: FnMut() -> RFut,
        RFut: std::future::Future<Output = Vec<String>>,
    {
        let mut intent_rx = self.intent_rx.lock().take().expect("run() called more than once");
        let mut backoff = INITIAL_BACKOFF;

        loop {
            self.state.set(ConnectionState::Connecting);
            let url = format!("{}/ws", self.stream_base_url);
            let connected = connect_async(&url).await;

            let (mut write, mut read) = match connected {
                Ok((stream, _)) => {
                    info!(%url, "upstream market-data WebSocket connected");
                    backoff = INITIAL_BACKOFF;
                    self.state.set(ConnectionState::Up);
                    stream.split()
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "upstream connect failed");
                    self.state.set(ConnectionState::Disconnected);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    continue;
                }
            };

            // Full resubscribe from state tables, bypassing the batch window.
            let streams = full_resubscribe().await;
            if !streams.is_empty() && send_subscribe(&mut write, &streams).await.is_err() {
                self.state.set(ConnectionState::Degraded);
                continue;
            }

            let mut batch: HashSet<String> = HashSet::new();
            let mut unbatch: HashSet<String> = HashSet::new();
            let mut batch_timer = tokio::time::interval(BATCH_WINDOW);

            'connection: loop {
                tokio::select! {
                    _ = self.reconnect.notified() => {
                        info!("forced reconnect requested (subscription.clean)");
                        break 'connection;
                    }
                    intent = intent_rx.recv() => {
                        match intent {
                            Some(Intent::Subscribe(s)) => { unbatch.remove(&s); batch.insert(s); }
                            Some(Intent::Unsubscribe(s)) => { batch.remove(&s); unbatch.insert(s); }
                            None => break 'connection,
                        }
                    }
                    _ = batch_timer.tick() => {
                        if !batch.is_empty() {
                            let streams: Vec<String> = batch.drain().collect();
                            if send_subscribe(&mut write, &streams).await.is_err() {
                                self.state.set(ConnectionState::Degraded);
                                break 'connection;
                            }
                        }
                        if !unbatch.is_empty() {
                            let streams: Vec<String> = unbatch.drain().collect();
                            if send_unsubscribe(&mut write, &streams).await.is_err() {
                                self.state.set(ConnectionState::Degraded);
                                break 'connection;
                            }
                        }
                    }
                    frame = read.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                match parse_tick(&text) {
                                    Some(tick) => on_tick(tick),
                                    None => debug!("non-tick frame ignored (subscribe ack or control message)"),
                                }
                            }
                            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                            Some(Ok(Message::Close(_))) | None => {
                                warn!("upstream WebSocket closed — reconnecting");
                                break 'connection;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!(error = %e, "upstream WebSocket read error — reconnecting");
                                break 'connection;
                            }
                        }
                    }
                }
            }

            self.state.set(ConnectionState::Disconnected);
        }
    }
}

async fn send_subscribe<S>(sink: &mut S, streams: &[String]) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    send_method(sink, "SUBSCRIBE", streams).await
}

async fn send_unsubscribe<S>(sink: &mut S, streams: &[String]) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    send_method(sink, "UNSUBSCRIBE", streams).await
}

async fn send_method<S>(sink: &mut S, method: &str, streams: &[String]) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
{
    let frame = serde_json::json!({ "method": method, "params": streams, "id": 1 });
    let text = frame.to_string();
    sink.send(Message::Text(text.into())).await.map_err(|_| ())
}

/// Parse an inbound combined-stream frame (`{"stream": "...", "data": {...}}`);
/// returns `None` for subscribe/unsubscribe acknowledgements and other
/// control frames that don't carry a `stream` field.
fn parse_tick(text: &str) -> Option<Tick> {
    let root: serde_json::Value = serde_json::from_str(text).ok()?;
    let stream = root.get("stream")?.as_str()?.to_string();
    let payload = root.get("data")?.clone();
    Some(Tick { stream, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_combined_stream_frame() {
        let raw = r#"{"stream":"btcusdt@kline_1m","data":{"e":"kline"}}"#;
        let tick = parse_tick(raw).unwrap();
        assert_eq!(tick.stream, "btcusdt@kline_1m");
    }

    #[test]
    fn ignores_non_stream_frames() {
        assert!(parse_tick(r#"{"result":null,"id":1}"#).is_none());
    }

    #[test]
    fn state_tracker_round_trips() {
        let tracker = ConnectionStateTracker::new();
        assert_eq!(tracker.get(), ConnectionState::Disconnected);
        tracker.set(ConnectionState::Up);
        assert_eq!(tracker.get(), ConnectionState::Up);
    }
}
