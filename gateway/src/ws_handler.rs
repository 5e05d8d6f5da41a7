// =============================================================================
// WebSocket handler — the three-phase ACK/SUCCESS/ERROR/UPDATE protocol over
// axum (spec §4.5, §4.6 / C5)
// =============================================================================
//
// Structurally this mirrors the teacher's `api/ws.rs`: split the socket,
// register state on connect, run a concurrent push/recv `tokio::select!`
// loop, clean up on disconnect. What changes is *what* gets pushed — instead
// of a periodic full-state snapshot, each client owns an mpsc receiver fed
// by the Client Manager, and every inbound frame gets an immediate ACK
// followed eventually by its own terminal SUCCESS/ERROR/UPDATE.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use aurora_core::protocol::{wrap_outbound, ClientRequest, ErrorCode, ErrorData, ServerMessage};
use aurora_core::AppError;

use crate::app_state::AppState;
use crate::handlers::{self, Outcome};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (client_id, mut outbound_rx) = state.clients.register();
    let (mut sender, mut receiver) = socket.split();

    info!(%client_id, "client connected");

    let mut last_pong = Instant::now();
    let mut heartbeat = interval(state.timeouts.heartbeat_interval);

    loop {
        tokio::select! {
            // ── Push loop: drain this client's outbound queue ───────────
            msg = outbound_rx.recv() => {
                match msg {
                    Some(value) => {
                        if let Err(e) = send_json(&mut sender, &value).await {
                            debug!(%client_id, error = %e, "send failed — disconnecting");
                            break;
                        }
                    }
                    None => break,
                }
            }

            // ── Heartbeat: drop clients that stopped answering pings ────
            _ = heartbeat.tick() => {
                if last_pong.elapsed() > state.timeouts.heartbeat_timeout {
                    warn!(%client_id, "heartbeat timeout — disconnecting");
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }

            // ── Recv loop: decode and dispatch inbound requests ─────────
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, client_id, &text, &mut sender).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!(%client_id, "close frame received");
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!(%client_id, "binary frame ignored");
                    }
                    Some(Err(e)) => {
                        warn!(%client_id, error = %e, "receive error — disconnecting");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.tasks.drop_client(client_id);
    state.subscriptions.disconnect(client_id).await;
    state.clients.unregister(client_id);
    info!(%client_id, "client disconnected");
}

async fn handle_frame(
    state: &AppState,
    client_id: uuid::Uuid,
    text: &str,
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
) {
    let request_id = extract_request_id(text);

    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "malformed client request");
            let error = wrap_outbound(
                ServerMessage::Error(ErrorData {
                    error_code: ErrorCode::UnknownAction,
                    error_message: "malformed request".to_string(),
                }),
                request_id,
            );
            let _ = send_json(sender, &error).await;
            return;
        }
    };

    // Phase 1: immediate ACK regardless of outcome (spec §4.6).
    let ack = wrap_outbound(ServerMessage::Ack, request_id.clone());
    if send_json(sender, &ack).await.is_err() {
        return;
    }

    // Phase 2/3: dispatch; an `Outcome::Deferred` means the data processor
    // delivers the terminal message later when the task resolves.
    match handlers::dispatch(state, client_id, request_id.clone(), request).await {
        Ok(Outcome::Immediate(message)) => {
            let _ = send_json(sender, &wrap_outbound(message, request_id)).await;
        }
        Ok(Outcome::Deferred) => {}
        Err(err) => {
            let message = error_to_message(&err);
            let _ = send_json(sender, &wrap_outbound(message, request_id)).await;
        }
    }
}

fn error_to_message(err: &AppError) -> ServerMessage {
    ServerMessage::Error(ErrorData {
        error_code: err.error_code(),
        error_message: err.to_string(),
    })
}

/// Pull `requestId` out of the raw inbound frame before the typed decode —
/// malformed requests still need to echo it back on the error frame.
fn extract_request_id(text: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("requestId").and_then(|r| r.as_str()).map(str::to_string))
}

async fn send_json(
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    value: &serde_json::Value,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    sender.send(Message::Text(text.into())).await
}
