//! Base traits and types for streaming speech-to-text engines.
//!
//! An engine session is a duplex handle: the input side is a [`ChunkSink`]
//! accepting raw audio chunks, the output side is a lazy [`TranscriptStream`]
//! of partial and final recognition events that ends when the engine closes
//! the stream.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;

use super::aws_transcribe::MediaEncoding;
use crate::auth::CredentialHandle;

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised by a streaming engine session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum STTError {
    /// The engine session could not be opened
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Credentials were rejected by the engine
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid stream configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The engine reported an error mid-stream
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Transport failure while talking to the engine
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Audio chunk rejected before sending
    #[error("Invalid audio format: {0}")]
    InvalidAudioFormat(String),

    /// Input side already closed with `end_stream`
    #[error("Stream closed")]
    StreamClosed,
}

/// Result type for engine operations.
pub type STTResult<T> = Result<T, STTError>;

// =============================================================================
// Events
// =============================================================================

/// A recognition event produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// In-progress recognition of the current utterance segment
    Partial(String),
    /// Settled recognition; ends the segment
    Final(String),
}

impl TranscriptEvent {
    pub fn text(&self) -> &str {
        match self {
            Self::Partial(text) | Self::Final(text) => text,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }
}

/// Lazy, unbounded sequence of engine events.
pub type TranscriptStream = Pin<Box<dyn Stream<Item = STTResult<TranscriptEvent>> + Send>>;

// =============================================================================
// Stream Configuration
// =============================================================================

/// Parameters for opening an engine stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// BCP-47 language code (e.g., "en-US")
    pub language_code: String,
    /// Audio sample rate in Hz
    pub sample_rate_hz: u32,
    /// Encoding of the audio chunks
    pub encoding: MediaEncoding,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            sample_rate_hz: 16000,
            encoding: MediaEncoding::Pcm,
        }
    }
}

// =============================================================================
// Input Side
// =============================================================================

/// Upper bound on a single chunk forwarded to the engine.
///
/// Amazon Transcribe recommends 50-200ms chunks. At 48kHz stereo 16-bit,
/// 200ms is about 38KB. We set a limit of 256KB to prevent memory issues.
pub const MAX_AUDIO_CHUNK_SIZE: usize = 256 * 1024;

/// Input side of an engine stream.
///
/// Chunks are delivered through a bounded channel, so `send_chunk` applies
/// backpressure when the engine falls behind. Dropping the sender via
/// `end_stream` signals end-of-audio to the engine.
#[derive(Debug)]
pub struct ChunkSink {
    tx: Option<mpsc::Sender<Bytes>>,
}

impl ChunkSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Create a sink together with the receiving end consumed by the engine.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    /// Send one chunk. A chunk is delivered whole or not at all.
    pub async fn send_chunk(&mut self, chunk: Bytes) -> STTResult<()> {
        if chunk.len() > MAX_AUDIO_CHUNK_SIZE {
            return Err(STTError::InvalidAudioFormat(format!(
                "Audio chunk size {} exceeds maximum allowed size of {} bytes",
                chunk.len(),
                MAX_AUDIO_CHUNK_SIZE
            )));
        }

        let tx = self.tx.as_ref().ok_or(STTError::StreamClosed)?;
        tx.send(chunk)
            .await
            .map_err(|_| STTError::NetworkError("Engine audio input closed".to_string()))
    }

    /// Signal end-of-stream. Returns false if the stream was already ended.
    pub fn end_stream(&mut self) -> bool {
        self.tx.take().is_some()
    }

    pub fn is_open(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

/// Duplex handle returned by [`StreamingEngine::start_stream`].
pub struct UpstreamStream {
    pub sink: ChunkSink,
    pub events: TranscriptStream,
}

impl fmt::Debug for UpstreamStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamStream")
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Engine Trait
// =============================================================================

/// A streaming speech-recognition engine.
#[async_trait]
pub trait StreamingEngine: Send + Sync {
    /// Open a new recognition stream.
    ///
    /// Returns once the engine has accepted the session; failures here are
    /// start failures, failures on the returned event stream are mid-stream.
    async fn start_stream(
        &self,
        credentials: &CredentialHandle,
        config: &StreamConfig,
    ) -> STTResult<UpstreamStream>;

    /// Human readable engine name for logs.
    fn provider_info(&self) -> &'static str;
}
