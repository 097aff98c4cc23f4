use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use ferri_core::dispatcher::Dispatcher;
use ferri_core::model::{Request, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::AppState;

const OUTBOUND_BUFFER: usize = 256;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connection's lifetime: a reader loop driving the dispatcher and a
/// writer task that is the outbound channel's single reader, serializing
/// every frame before it hits the socket.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Response>(OUTBOUND_BUFFER);

    let writer = tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let frame = match serde_json::to_string(&response) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to encode response, dropping frame");
                    continue;
                }
            };
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let dispatcher = Dispatcher::new(state.shared.clone(), tx);

    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(m) => m,
            Err(err) => {
                debug!(error = %err, "websocket read error, closing connection");
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<Request>(&text) {
            Ok(request) => dispatcher.accept(request),
            Err(err) => {
                debug!(error = %err, "ignoring malformed request frame");
            }
        }
    }

    dispatcher.shutdown().await;
    let _ = writer.await;
}
