//! WebSocket support for real-time controller updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use opener_core::{ControllerEvent, ControllerSnapshot};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Connection-level messages that are not controller events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Full state, sent on connect and after the client lagged.
    Snapshot { snapshot: ControllerSnapshot },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn label(&self) -> &'static str {
        match self {
            WsMessage::Snapshot { .. } => "snapshot",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Metric label for a controller event.
pub fn event_label(event: &ControllerEvent) -> &'static str {
    match event {
        ControllerEvent::AssetChanged { .. } => "asset_changed",
        ControllerEvent::PlaybackChanged { .. } => "playback_changed",
        ControllerEvent::JobStarted { .. } => "job_started",
        ControllerEvent::JobProgress { .. } => "job_progress",
        ControllerEvent::JobFinished { .. } => "job_finished",
        ControllerEvent::PhaseChanged { .. } => "phase_changed",
        ControllerEvent::Notice { .. } => "notice",
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so nothing falls in between
    let mut rx = state.controller().events();
    let controller = state.controller().clone();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        let snapshot = WsMessage::Snapshot {
            snapshot: controller.snapshot().await,
        };
        if send_json(&mut sender, snapshot.label(), &snapshot).await.is_err() {
            return;
        }

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if send_json(&mut sender, event_label(&event), &event).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("WebSocket client lagged, skipped {} events", n);
                            WS_LAG_EVENTS.inc();
                            // Resync with a full snapshot
                            let snapshot = WsMessage::Snapshot {
                                snapshot: controller.snapshot().await,
                            };
                            if send_json(&mut sender, snapshot.label(), &snapshot).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Event channel closed");
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    let msg = WsMessage::Heartbeat {
                        timestamp: chrono::Utc::now().timestamp(),
                    };
                    if send_json(&mut sender, msg.label(), &msg).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

/// Serializes and sends one message. Serialization failures are logged and
/// skipped; only a closed socket is an error.
async fn send_json<S, T>(sender: &mut S, label: &'static str, msg: &T) -> Result<(), ()>
where
    S: SinkExt<Message> + Unpin,
    T: Serialize,
{
    match serde_json::to_string(msg) {
        Ok(json) => {
            WS_MESSAGES_SENT.with_label_values(&[label]).inc();
            sender
                .send(Message::Text(json.into()))
                .await
                .map_err(|_| ())
        }
        Err(e) => {
            error!("Failed to serialize {} message: {}", label, e);
            Ok(())
        }
    }
}
