//! WebSocket handler: one connection, one participant.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws`
//! 2. The hub seats the connection in the oldest session with a free seat,
//!    or a new one, and the client receives a `connection` message
//! 3. A writer task drains the participant's outbox into the socket, each
//!    write bounded by the write timeout
//! 4. The read loop hands every text frame to the dispatcher until the
//!    client leaves, goes silent past the idle timeout, or the server shuts
//!    down
//! 5. On exit the participant is removed from its session
//!
//! If admission is refused the client receives a single `error` message and
//! the connection is closed.
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws');
//!
//! ws.onmessage = (event) => {
//!   const data = JSON.parse(event.data);
//!   if (data.type === 'gameState') {
//!     render(data.state);
//!   }
//! };
//!
//! ws.send(JSON.stringify({ type: 'ready' }));
//! ws.send(JSON.stringify({ type: 'move', x: 10, y: 12 }));
//! ```

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use enclose::{
    HubError,
    constants::SHUTTING_DOWN,
    net::{self, Dispatched, ServerMessage},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use log::{debug, info, warn};
use std::{
    sync::atomic::Ordering,
    time::{Duration, Instant},
};
use tokio::{sync::mpsc, time::timeout};

use super::{AppState, request_id::RequestId};
use crate::{logging, metrics};

/// Frames queued for one connection's writer
const OUTBOX_CAPACITY: usize = 32;

/// Upgrade an HTTP request on `/ws` to a game connection.
///
/// Once shutdown has begun, upgrades are refused with
/// `503 Service Unavailable`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    request_id: RequestId,
) -> Response {
    if state.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, SHUTTING_DOWN).into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, request_id))
}

/// Drain `outbox` into the socket until every sender is gone or a write
/// fails, then close the socket.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<String>,
    write_timeout: Duration,
) {
    while let Some(text) = outbox.recv().await {
        match timeout(write_timeout, sender.send(Message::Text(text.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("WebSocket write failed: {}", e);
                return;
            }
            Err(_) => {
                warn!("WebSocket write timed out after {:?}", write_timeout);
                return;
            }
        }
    }

    let _ = timeout(write_timeout, sender.send(Message::Close(None))).await;
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState, request_id: RequestId) {
    let (sender, mut receiver) = socket.split();
    let (outbox, outbox_rx) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    let transport = state.transport;

    let mut send_task = tokio::spawn(write_loop(sender, outbox_rx, transport.write_timeout));

    metrics::websocket_connections_total();
    let active = state.connections.fetch_add(1, Ordering::AcqRel) + 1;
    metrics::websocket_connections_active(active);

    let admitted = if state.is_shutting_down() {
        Err(HubError::Closed)
    } else {
        state.hub.admit(outbox.clone()).await
    };
    metrics::active_sessions(state.hub.session_count().await);

    let (session, participant) = match admitted {
        Ok(pair) => pair,
        Err(e) => {
            let outcome = match e {
                HubError::Closed => "closed",
                HubError::Full | HubError::Session(_) => "full",
            };
            metrics::admissions_total(outcome);
            warn!("[{}] Admission refused: {}", request_id.as_str(), e);

            let refusal = ServerMessage::Error {
                message: e.client_message(),
            };
            match refusal.to_json() {
                Ok(json) => {
                    let _ = outbox.send_timeout(json, transport.write_timeout).await;
                }
                Err(e) => warn!("Failed to serialize admission error: {}", e),
            }
            drop(outbox);

            let _ = send_task.await;
            release_connection(&state);
            return;
        }
    };
    drop(outbox);

    metrics::admissions_total("admitted");
    info!(
        "[{}] WebSocket connected: session={}, player={} ({})",
        request_id.as_str(),
        session.id(),
        participant.seat(),
        participant.id()
    );

    let mut shutdown = state.shutdown.clone();
    let mut writer_done = false;
    loop {
        let next = tokio::select! {
            next = timeout(transport.idle_timeout, receiver.next()) => next,
            Ok(()) = shutdown.changed() => {
                info!("Closing {} for shutdown", participant.id());
                break;
            }
            _ = &mut send_task => {
                debug!("Writer for {} stopped", participant.id());
                writer_done = true;
                break;
            }
        };

        match next {
            Err(_) => {
                info!(
                    "WebSocket idle for {:?}, closing {}",
                    transport.idle_timeout,
                    participant.id()
                );
                break;
            }
            Ok(None) | Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Err(e))) => {
                debug!("WebSocket read error for {}: {}", participant.id(), e);
                break;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                metrics::websocket_messages_received();
                let started = Instant::now();
                let outcome = net::handle_frame(&state.hub, &participant, text.as_str()).await;
                record_dispatch(outcome, started);
            }
            Ok(Some(Ok(_))) => {}
        }
    }

    if net::disconnect(&state.hub, &participant).await.is_none() {
        // The hub already dropped the session; still let go of the seat.
        session.remove_participant(participant.id()).await;
    }
    metrics::active_sessions(state.hub.session_count().await);
    drop(participant);
    drop(session);

    // The writer exits once the session has let go of the participant.
    if !writer_done && timeout(transport.write_timeout, &mut send_task).await.is_err() {
        send_task.abort();
    }
    release_connection(&state);

    info!("[{}] WebSocket disconnected", request_id.as_str());
}

fn record_dispatch(outcome: Dispatched, started: Instant) {
    let command = match outcome {
        Dispatched::Discarded => "discarded",
        Dispatched::Ignored => "ignored",
        Dispatched::Ready { .. } => "ready",
        Dispatched::Moved(_) => "move",
        Dispatched::Reset => "reset",
    };

    if let Dispatched::Moved(moved) = outcome {
        metrics::moves_total(moved.enclosed);
        if moved.game_over {
            metrics::games_finished_total();
        }
    }

    let elapsed = started.elapsed();
    metrics::dispatch_duration_ms(command, elapsed.as_secs_f64() * 1000.0);
    logging::log_timing("dispatch", elapsed, Some(command));
}

fn release_connection(state: &AppState) {
    let active = state.connections.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
    metrics::websocket_connections_active(active);
}
