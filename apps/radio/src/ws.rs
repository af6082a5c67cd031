use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use iokit::LoopHandle;
use shared::domain::ClientId;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Clone)]
struct AppState {
    handle: LoopHandle,
}

pub fn build_router(handle: LoopHandle) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/websocket", get(ws_handler))
        .with_state(AppState { handle })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state.handle, socket))
}

/// Hands the connection to the loop as an outbox and pumps queued messages
/// into the socket until either side goes away.
async fn ws_connection(handle: LoopHandle, socket: WebSocket) {
    let client = ClientId::random();
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<String>();
    if !handle.client_opened(client, outbox) {
        warn!(%client, "websocket refused, panel is shutting down");
        return;
    }

    let (mut sender, mut receiver) = socket.split();
    let send_task = tokio::spawn(async move {
        while let Some(text) = outgoing.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        if let Message::Close(_) = message {
            break;
        }
        debug!(%client, "ignoring inbound websocket message");
    }

    handle.client_closed(client);
    send_task.abort();
}

#[cfg(test)]
#[path = "tests/ws_tests.rs"]
mod tests;
