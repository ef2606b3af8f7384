use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures_util::StreamExt;

use crate::broadcast::Subscription;
use crate::error::ApiError;
use crate::state::AppState;
use crate::subscribers::RegistryFull;

#[utoipa::path(
    get,
    path = "/ws",
    description = "Pushes status_update, metrics_update and container_update envelopes: \
                   one full set on connect, then one set per broadcast tick",
    responses(
        (status = 101, description = "WebSocket upgrade initiated"),
        (status = 503, description = "Subscriber limit reached", body = Object)
    ),
    tag = "Streaming"
)]
pub async fn live_ws_handler(
    State(app): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    // Registered before the upgrade so the limit answers with a real status.
    let subscription = app
        .broadcaster
        .connect()
        .await
        .map_err(|RegistryFull(limit)| ApiError::TooManyConnections(limit))?;

    Ok(ws.on_upgrade(move |socket| forward(socket, subscription)))
}

/// Copies queued envelopes to the socket until either side goes away.
/// Dropping `subscription` on return deregisters the client.
async fn forward(socket: WebSocket, mut subscription: Subscription) {
    let id = subscription.id();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = subscription.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                        tracing::debug!(subscriber = id, "send failed, dropping subscriber");
                        break;
                    }
                }
                None => {
                    // Evicted or shutting down.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(subscriber = id, "socket error: {e}");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
