pub mod llm;
pub mod session;
pub mod stt;

// Re-export commonly used types for convenience
pub use stt::{
    AwsRegion, AwsTranscribeEngine, ChunkSink, MediaEncoding, STTError, STTProvider, STTResult,
    StreamConfig, StreamingEngine, TranscriptEvent, TranscriptStream, UpstreamStream,
    create_streaming_engine,
};

pub use session::{
    SessionContext, SessionController, SessionEnd, SessionError, SessionRegistry, SessionSettings,
    SessionState,
};
