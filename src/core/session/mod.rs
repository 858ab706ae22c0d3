//! Streaming session relay.
//!
//! One session per client connection: credentials are checked, an upstream
//! engine stream is opened, audio is re-chunked and forwarded, and transcripts
//! are aggregated and relayed back until the session ends.

mod aggregator;
mod buffer;
mod controller;
mod error;
mod keep_alive;
mod messages;
mod registry;
mod state;

pub use aggregator::{AggregatorState, TranscriptAggregator};
pub use buffer::{AudioChunker, DEFAULT_CHUNK_SIZE};
pub use controller::{
    DEFAULT_AUTH_TIMEOUT, DEFAULT_DRAIN_TIMEOUT, DEFAULT_INACTIVITY_TIMEOUT, SessionContext,
    SessionController, SessionSettings,
};
pub use error::{SessionEnd, SessionError};
pub use keep_alive::{DEFAULT_KEEP_ALIVE_INTERVAL, KeepAlive};
pub use messages::{
    CLOSE_INTERNAL_ERROR, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, ClientFrame, IncomingControl,
    MessageRoute, OutgoingMessage,
};
pub use registry::{RegistryError, SessionEntry, SessionRegistry, SessionSnapshot};
pub use state::{SessionState, StateHandle};
