//! WebSocket signaling connections
//!
//! Each socket gets a connection handle, a writer task draining its send
//! queue, and a reader loop forwarding text frames to the hub. Binary frames
//! are ignored.

use crate::signaling::ConnectionId;
use crate::web::SharedState;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Handle one signaling WebSocket until it closes
pub async fn handle_signaling_connection(socket: WebSocket, state: Arc<SharedState>) {
    let connection = ConnectionId::new();
    info!("New signaling connection {}", connection);
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    if !state.hub.connect(connection, tx) {
        error!("Signaling hub is not running, dropping connection {}", connection);
        send_task.abort();
        return;
    }

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !state.hub.frame(connection, text.as_str().to_string()) {
                    warn!("Signaling hub stopped, closing connection {}", connection);
                    break;
                }
            }
            Ok(Message::Binary(data)) => {
                debug!("Ignoring {} byte binary message from {}", data.len(), connection);
            }
            Ok(Message::Ping(_)) => {
                debug!("Received ping from {}", connection);
            }
            Ok(Message::Close(_)) => {
                info!("Signaling connection {} closed by peer", connection);
                break;
            }
            Err(e) => {
                error!("WebSocket error on {}: {}", connection, e);
                break;
            }
            _ => {}
        }
    }

    state.hub.disconnect(connection);
    send_task.abort();

    info!("Signaling connection {} finished", connection);
}
