//! Streaming relay WebSocket handler
//!
//! Upgrades `/ws/{client_id}` and hands the connection to a
//! [`SessionController`]. The socket is split into an inbound frame stream
//! and a single writer task fed by a bounded channel.

use axum::{
    Extension,
    extract::{
        Path, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::session::{ClientFrame, MessageRoute, SessionController};
use crate::middleware::ConnectionSlot;
use crate::state::AppState;

/// Channel buffer size for outbound frames
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Time allowed for the writer to flush queued frames after the session ends
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve the session id from the path; blank or missing ids get a UUID.
pub fn session_id_from_path(client_id: Option<&str>) -> String {
    client_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Streaming relay WebSocket handler
///
/// # Protocol
/// 1. Client sends a credential JSON text frame
/// 2. Client streams binary 16-bit PCM audio frames
/// 3. Server sends transcript text frames
/// 4. Client may send `{"type":"end_of_audio"}` to finish
pub async fn ws_relay_handler(
    ws: WebSocketUpgrade,
    client_id: Option<Path<String>>,
    State(state): State<Arc<AppState>>,
    slot: Option<Extension<Arc<ConnectionSlot>>>,
) -> Response {
    let session_id = session_id_from_path(client_id.as_ref().map(|Path(id)| id.as_str()));
    let slot = slot.map(|Extension(slot)| slot);
    let client_ip = slot.as_ref().map(|slot| slot.ip());

    info!(
        session_id = %session_id,
        client_ip = ?client_ip,
        "Relay WebSocket connection upgrade requested"
    );

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state, session_id, slot))
}

/// Map transport messages to client frames. Pings and pongs are dropped.
fn to_client_frame(message: Result<Message, axum::Error>) -> Option<ClientFrame> {
    match message {
        Ok(Message::Binary(data)) => Some(ClientFrame::Audio(data)),
        Ok(Message::Text(text)) => Some(ClientFrame::Text(text.to_string())),
        Ok(Message::Close(_)) => Some(ClientFrame::Close),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
        Err(e) => {
            warn!("WebSocket receive error: {}", e);
            Some(ClientFrame::Close)
        }
    }
}

async fn handle_relay_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    session_id: String,
    slot: Option<Arc<ConnectionSlot>>,
) {
    let client_ip = slot.as_ref().map(|slot| slot.ip());
    let (mut sender, receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);

    // Single writer for all outbound frames
    let writer_session_id = session_id.clone();
    let mut writer = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let should_close = matches!(route, MessageRoute::Close { .. });

            let result = match route {
                MessageRoute::Transcript(text) => sender.send(Message::Text(text.into())).await,
                MessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Close { code, reason } => {
                    debug!(session_id = %writer_session_id, code, "Sending close frame");
                    sender
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await
                }
            };

            if let Err(e) = result {
                debug!(session_id = %writer_session_id, "Failed to send WebSocket message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    let inbound = receiver
        .filter_map(|message| async move { to_client_frame(message) })
        .boxed();

    let controller = SessionController::new(
        session_id.clone(),
        client_ip,
        inbound,
        message_tx,
        app_state.session_context(),
    );
    let end = controller.run().await;

    if timeout(WRITER_SHUTDOWN_TIMEOUT, &mut writer).await.is_err() {
        warn!(session_id = %session_id, "Writer did not finish in time, aborting");
        writer.abort();
    }

    drop(slot);

    info!(
        session_id = %session_id,
        reason = end.label(),
        "Relay WebSocket connection terminated"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_session_id_from_path() {
        assert_eq!(session_id_from_path(Some("client-42")), "client-42");
        assert_eq!(session_id_from_path(Some("  padded ")), "padded");

        let generated = session_id_from_path(Some("   "));
        assert!(Uuid::parse_str(&generated).is_ok());
        assert!(Uuid::parse_str(&session_id_from_path(None)).is_ok());
    }

    #[test]
    fn test_to_client_frame() {
        assert_eq!(
            to_client_frame(Ok(Message::Binary(Bytes::from_static(b"\x01\x02")))),
            Some(ClientFrame::Audio(Bytes::from_static(b"\x01\x02")))
        );
        assert_eq!(
            to_client_frame(Ok(Message::Text("hello".into()))),
            Some(ClientFrame::Text("hello".to_string()))
        );
        assert_eq!(
            to_client_frame(Ok(Message::Close(None))),
            Some(ClientFrame::Close)
        );
        assert_eq!(to_client_frame(Ok(Message::Ping(Bytes::new()))), None);
    }
}
