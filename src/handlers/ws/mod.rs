//! Streaming relay WebSocket endpoint
//!
//! The session protocol itself lives in `core::session`; this module only
//! adapts the axum WebSocket to it.

mod handler;

pub use handler::{session_id_from_path, ws_relay_handler};
