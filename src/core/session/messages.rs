//! Frames exchanged with the client over a streaming connection.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// WebSocket close code for a normal shutdown.
pub const CLOSE_NORMAL: u16 = 1000;
/// WebSocket close code for a missing or invalid credential payload.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// WebSocket close code for a session that ended in failure.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Inbound frame, decoupled from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Raw PCM audio
    Audio(Bytes),
    /// Credential message or control message
    Text(String),
    /// Client sent a close frame
    Close,
}

/// Control messages a client may send after authenticating.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingControl {
    /// No more audio will follow
    EndOfAudio,
}

impl IncomingControl {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// JSON messages sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    Error { message: String },
}

/// Routes for the single writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRoute {
    /// Plain text transcript frame
    Transcript(String),
    /// JSON control frame
    Outgoing(OutgoingMessage),
    /// Close frame; the writer stops after sending it
    Close { code: u16, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_end_of_audio() {
        assert_eq!(
            IncomingControl::parse(r#"{"type":"end_of_audio"}"#),
            Some(IncomingControl::EndOfAudio)
        );
        assert_eq!(IncomingControl::parse(r#"{"type":"pause"}"#), None);
        assert_eq!(IncomingControl::parse("hello"), None);
    }

    #[test]
    fn test_error_message_serialization() {
        let message = OutgoingMessage::Error {
            message: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&message).unwrap(),
            r#"{"type":"error","message":"boom"}"#
        );
    }
}
