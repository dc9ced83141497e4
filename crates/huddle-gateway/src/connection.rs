use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::bus::EventBus;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// Once 2 consecutive Pongs have been missed the connection is dropped,
/// about 45 seconds after the peer's last sign of life.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Drive one authenticated push connection until it closes.
///
/// The socket was authenticated at the HTTP upgrade, so this goes straight
/// to forwarding: every bus frame is serialized to one JSON text frame and
/// sent as produced with no buffering or replay; backpressure defers to the
/// socket's own send queue. Dropping the broadcast receiver on exit is the
/// unsubscribe; a dead connection never leaks a bus listener.
pub async fn serve(socket: WebSocket, bus: EventBus, user_id: String, name: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut bus_rx = bus.subscribe();

    info!("{} ({}) connected to gateway", name, user_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward bus frames to the client, interleaved with heartbeats.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = bus_rx.recv() => {
                    let frame = match result {
                        Ok(frame) => frame,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Push subscriber lagged by {} frames", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode push frame: {}", e);
                            continue;
                        }
                    };

                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The push channel is server->client; inbound frames only matter for
    // liveness and shutdown.
    let recv_user = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                Message::Text(text) => {
                    debug!(
                        "Ignoring inbound text frame from {} ({} bytes)",
                        recv_user,
                        text.len()
                    );
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", name, user_id);
}
