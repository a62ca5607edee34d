//! WebSocket connection state machine.
//!
//! Handles the read and write loops for a single WebSocket connection.
//! Inbound frames are published to the bus, never broadcast directly; the
//! supervisor's relay delivers them back through the registry like any
//! peer's message.

use std::time::Duration;

use axum::extract::ws::{Message as WsFrame, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::frame::{self, Inbound};
use crate::app_state::AppState;
use crate::bus::DistributionBus;
use crate::domain::{
    CloseSignal, Connection, ConnectionEndpoint, ConnectionId, ConnectionState, Message,
};

/// Runs a connection from registration until its socket is released.
///
/// The connection is removed from the registry exactly once, when the
/// registration guard drops, whichever loop ends first.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (conn, endpoint) = Connection::open(state.connection.outbound_queue_capacity);
    let guard = state.registry.register(conn);
    let id = guard.id();
    tracing::debug!(connection = %id, state = %ConnectionState::Active, "connection registered");

    let ConnectionEndpoint {
        outbound, close, ..
    } = endpoint;
    let (ws_tx, ws_rx) = socket.split();

    let mut writer = tokio::spawn(write_loop(
        id,
        ws_tx,
        outbound,
        close.clone(),
        state.connection.write_timeout,
    ));
    let mut writer_done = false;

    tokio::select! {
        () = read_loop(id, ws_rx, state.bus.as_ref(), &close) => {}
        _ = &mut writer => writer_done = true,
    }

    tracing::debug!(connection = %id, state = %ConnectionState::Closing, "connection closing");
    drop(guard);
    if !writer_done {
        let _ = writer.await;
    }
    tracing::debug!(connection = %id, state = %ConnectionState::Closed, "connection closed");
}

/// Forwards client frames to the bus until the peer goes away or the
/// connection is closed from our side.
async fn read_loop(
    id: ConnectionId,
    mut stream: SplitStream<WebSocket>,
    bus: &dyn DistributionBus,
    close: &CloseSignal,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = close.closed() => {
                tracing::debug!(connection = %id, "closed by gateway");
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(ws_frame)) => match frame::decode(ws_frame) {
                Inbound::Payload(message) => {
                    let bytes = message.len();
                    if let Err(err) = bus.publish(message).await {
                        tracing::warn!(
                            connection = %id,
                            bytes,
                            error = %err,
                            "publish failed; message dropped"
                        );
                    }
                }
                Inbound::Close => {
                    tracing::debug!(connection = %id, "peer closed");
                    return;
                }
                Inbound::Control => {}
            },
            Some(Err(err)) => {
                tracing::debug!(connection = %id, error = %err, "read failed");
                return;
            }
            None => return,
        }
    }
}

/// Drains the outbound queue into the socket. Every write is bounded by
/// `write_timeout`; a failed or timed-out write closes the connection.
async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WebSocket, WsFrame>,
    mut outbound: mpsc::Receiver<Message>,
    close: CloseSignal,
    write_timeout: Duration,
) {
    loop {
        let next = tokio::select! {
            biased;
            () = close.closed() => break,
            next = outbound.recv() => next,
        };
        let Some(message) = next else {
            break;
        };

        match tokio::time::timeout(write_timeout, sink.send(frame::encode(&message))).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(connection = %id, error = %err, "write failed");
                break;
            }
            Err(_) => {
                tracing::warn!(
                    connection = %id,
                    timeout_ms = u64::try_from(write_timeout.as_millis()).unwrap_or(u64::MAX),
                    "write timed out; closing slow connection"
                );
                break;
            }
        }
    }

    close.close();
    // Sends the close frame; the peer may already be gone.
    let _ = tokio::time::timeout(write_timeout, sink.close()).await;
}
