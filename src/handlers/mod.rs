//! HTTP and WebSocket request handlers
//!
//! - `api` - health check, instance credentials and session listing
//! - `inference` - transcription jobs and Bedrock text generation
//! - `upload` - multipart upload to S3
//! - `ws` - WebSocket transcription relay

pub mod api;
pub mod inference;
pub mod upload;
pub mod ws;

pub use api::{get_credentials, health_check, list_sessions};
pub use inference::{bedrock_inference, transcribe_audio};
pub use upload::upload_to_s3;
pub use ws::ws_relay_handler;
