//! Amazon Transcribe Streaming engine module.
//!
//! Real-time speech-to-text through the Amazon Transcribe Streaming API,
//! exposed as a [`StreamingEngine`](crate::core::stt::StreamingEngine).
//!
//! # Architecture
//!
//! The engine uses the AWS SDK for Rust to establish a bidirectional
//! streaming connection with Amazon Transcribe. Audio is sent as chunks
//! and transcription results are received as they become available.
//!
//! # Authentication
//!
//! Credentials are supplied per stream by the caller (the relay's credential
//! gate), never read from the process environment, so each client session
//! runs under the client's own AWS identity.
//!
//! # Limitations
//!
//! - Maximum session duration: 4 hours
//! - One stream per HTTP/2 session
//! - PCM audio must be 16-bit signed little-endian
//! - Streams with no audio for about 15 seconds are closed by the service,
//!   which is why sessions inject keep-alive silence

mod client;
mod config;
mod messages;


pub use client::AwsTranscribeEngine;
pub use config::{
    AwsRegion, AwsTranscribeConfig, DEFAULT_CONNECT_TIMEOUT_SECS, MAX_SAMPLE_RATE,
    MIN_SAMPLE_RATE, MediaEncoding, PartialResultsStability, RECOMMENDED_SAMPLE_RATE,
    validate_stream_config,
};
pub use messages::events_from_transcript;
