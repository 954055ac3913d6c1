use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use futures::{SinkExt, StreamExt};
use tracing::info;

use super::manager::SessionManager;
use super::state::AppState;
use super::subscribers::ChannelKind;
use crate::protocol::{unix_timestamp, ChannelMessage};

/// GET /
/// Liveness probe; always succeeds while the process is up
pub async fn probe(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.probe().await)
}

/// GET /status
/// Current engine state snapshot
pub async fn engine_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.current_status().await)
}

/// GET /start
/// Start the engine (background initialization)
pub async fn start_engine(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.start().await)
}

/// GET /shutdown
/// Stop the engine and release its resources
pub async fn shutdown_engine(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.shutdown().await)
}

/// GET /ws
/// Transcript channel: server→client fragment stream
pub async fn transcript_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        stream_channel(socket, state.manager, ChannelKind::Transcript, None)
    })
}

/// GET /status-ws
/// Status channel: server→client snapshot stream. New subscribers get the
/// current snapshot immediately instead of waiting for the next sample.
pub async fn status_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = ChannelMessage::Status {
        status: state.manager.current_status().await,
        timestamp: unix_timestamp(),
    };
    let greeting = serde_json::to_string(&snapshot).ok();
    ws.on_upgrade(move |socket| stream_channel(socket, state.manager, ChannelKind::Status, greeting))
}

/// Pump registry messages into one WebSocket until either side closes.
///
/// Both channels are server→client only; inbound frames are watched solely
/// to detect disconnection.
async fn stream_channel(
    socket: WebSocket,
    manager: Arc<SessionManager>,
    kind: ChannelKind,
    greeting: Option<String>,
) {
    let (id, mut feed) = manager.subscribe(kind).await;
    info!(channel = kind.as_str(), %id, "WebSocket subscriber connected");

    let (mut sink, mut stream) = socket.split();

    if let Some(payload) = greeting {
        if sink.send(Message::Text(payload)).await.is_err() {
            manager.unsubscribe(kind, &id).await;
            return;
        }
    }

    loop {
        tokio::select! {
            queued = feed.recv() => match queued {
                Some(payload) => {
                    if sink.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    manager.unsubscribe(kind, &id).await;
    info!(channel = kind.as_str(), %id, "WebSocket subscriber disconnected");
}
