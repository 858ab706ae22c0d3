pub mod aws_transcribe;
mod base;
pub mod batch;

// Re-export public types and traits
pub use base::{
    ChunkSink, MAX_AUDIO_CHUNK_SIZE, STTError, STTResult, StreamConfig, StreamingEngine,
    TranscriptEvent, TranscriptStream, UpstreamStream,
};

pub use aws_transcribe::{AwsRegion, AwsTranscribeConfig, AwsTranscribeEngine, MediaEncoding};
pub use batch::{AwsBatchTranscriber, BatchError, BatchTranscriber};

use std::sync::Arc;

/// Supported streaming engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum STTProvider {
    /// Amazon Transcribe Streaming STT API
    #[default]
    AwsTranscribe,
}

impl std::fmt::Display for STTProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            STTProvider::AwsTranscribe => write!(f, "aws-transcribe"),
        }
    }
}

impl std::str::FromStr for STTProvider {
    type Err = STTError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws-transcribe" | "aws_transcribe" | "amazon-transcribe" | "transcribe" => {
                Ok(STTProvider::AwsTranscribe)
            }
            _ => Err(STTError::ConfigurationError(format!(
                "Unsupported STT provider: {s}. Supported providers: aws-transcribe"
            ))),
        }
    }
}

/// Create the streaming engine for a provider.
pub fn create_streaming_engine(
    provider: STTProvider,
    config: AwsTranscribeConfig,
) -> Arc<dyn StreamingEngine> {
    match provider {
        STTProvider::AwsTranscribe => Arc::new(AwsTranscribeEngine::new(config)),
    }
}
