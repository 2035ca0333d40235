use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use varnava_events::UpdateChannel;

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.channel))
}

/// Forward channel messages to the socket until either side goes away.
///
/// The receiver yields `None` once a newer connection replaces this one.
async fn handle_socket(socket: WebSocket, channel: Arc<UpdateChannel>) {
    let conn_id = uuid::Uuid::new_v4();
    tracing::info!(conn_id = %conn_id, "Update subscriber connected");

    let mut updates = channel.attach();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(text) = update else {
                    tracing::debug!(conn_id = %conn_id, "Update subscriber replaced");
                    break;
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(conn_id = %conn_id, "WebSocket sink closed");
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    let _ = sink.close().await;
    tracing::info!(conn_id = %conn_id, "Update subscriber disconnected");
}
