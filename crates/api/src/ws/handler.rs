use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::handlers::status::StatusSnapshot;
use crate::state::AppState;

/// Client message asking for a fresh `initial_state` frame.
const REFRESH_REQUEST: &str = "request_refresh";

/// Frames the server sends besides forwarded monitor events.
#[derive(Serialize)]
#[serde(tag = "event", content = "data")]
enum ServerFrame {
    #[serde(rename = "initial_state")]
    InitialState(StatusSnapshot),
}

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// The bus subscription is taken before the initial snapshot is read, so
/// no event published in between is missed.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut events = state.event_bus.subscribe();
    let (mut sink, mut stream) = socket.split();

    if send_initial_state(&mut sink, &state).await.is_err() {
        tracing::debug!(conn_id = %conn_id, "WebSocket closed before initial state");
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_json(&mut sink, &event).await.is_err() {
                        tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(conn_id = %conn_id, skipped = n, "WebSocket client lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if is_refresh_request(text.as_str())
                        && send_initial_state(&mut sink, &state).await.is_err()
                    {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

type Sink = SplitSink<WebSocket, Message>;

async fn send_initial_state(sink: &mut Sink, state: &AppState) -> Result<(), axum::Error> {
    let snapshot = StatusSnapshot::collect(&state.registry).await;
    send_json(sink, &ServerFrame::InitialState(snapshot)).await
}

async fn send_json<T: Serialize>(sink: &mut Sink, frame: &T) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(text) => sink.send(Message::Text(text.into())).await,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize WebSocket frame");
            Ok(())
        }
    }
}

/// Accepts the bare `request_refresh` string or `{"event": "request_refresh"}`.
fn is_refresh_request(text: &str) -> bool {
    let text = text.trim();
    if text == REFRESH_REQUEST {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .map(|v| v["event"] == REFRESH_REQUEST)
        .unwrap_or(false)
}
