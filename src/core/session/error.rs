use thiserror::Error;

use super::registry::RegistryError;
use crate::core::stt::STTError;
use crate::errors::AuthError;

/// Failure that ends a session.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Failed to start transcription: {0}")]
    UpstreamStart(STTError),

    #[error("Transcription stream failed: {0}")]
    UpstreamStream(STTError),

    #[error("Transcription stream closed before end of audio")]
    UpstreamClosedEarly,

    #[error("Failed to send audio: {0}")]
    UpstreamSend(STTError),

    #[error("Session task failed: {0}")]
    Task(String),
}

/// Why a session ended. Decides the teardown path.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// Close frame or end of the client stream
    ClientDisconnect,
    /// No audio for the inactivity timeout
    InactivityTimeout,
    /// Client sent `end_of_audio`
    EndOfAudio,
    /// Engine closed its event stream after end of audio
    UpstreamClosed,
    Failed(SessionError),
}

impl SessionEnd {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ClientDisconnect => "client_disconnect",
            Self::InactivityTimeout => "inactivity_timeout",
            Self::EndOfAudio => "end_of_audio",
            Self::UpstreamClosed => "upstream_closed",
            Self::Failed(SessionError::Auth(_)) => "auth_error",
            Self::Failed(_) => "failed",
        }
    }
}

impl From<SessionError> for SessionEnd {
    fn from(error: SessionError) -> Self {
        Self::Failed(error)
    }
}
