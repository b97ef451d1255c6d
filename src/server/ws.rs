use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

use super::AppState;
use crate::broadcast::BroadcastChannel;

pub(super) async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let events = Arc::clone(state.events());
    ws.on_upgrade(move |socket| session(socket, events))
}

/// Reply to a client text frame, if any.
fn reply_to(text: &str) -> Option<&'static str> {
    (text.trim() == "ping").then_some("pong")
}

async fn session(socket: WebSocket, events: Arc<BroadcastChannel>) {
    let (id, mut rx) = events.subscribe();
    let (mut sink, mut stream) = socket.split();
    debug!("websocket {id} connected");

    loop {
        tokio::select! {
            event = rx.recv() => {
                // `None` means the channel dropped us as stalled.
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("cannot encode event for {id}: {e}");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let Some(reply) = reply_to(text.as_str()) else { continue };
                    if sink.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    events.unsubscribe(id);
    debug!("websocket {id} disconnected");
}
