use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connecting,
    Authenticating,
    Streaming,
    Draining,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Authenticating => "AUTHENTICATING",
            Self::Streaming => "STREAMING",
            Self::Draining => "DRAINING",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Shared cell holding a session's state.
///
/// The controller writes it; the registry and the keep-alive task only read.
#[derive(Debug, Clone)]
pub struct StateHandle(Arc<RwLock<SessionState>>);

impl StateHandle {
    pub fn new(state: SessionState) -> Self {
        Self(Arc::new(RwLock::new(state)))
    }

    pub fn get(&self) -> SessionState {
        *self.0.read()
    }

    pub(crate) fn set(&self, state: SessionState) {
        *self.0.write() = state;
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new(SessionState::Connecting)
    }
}
