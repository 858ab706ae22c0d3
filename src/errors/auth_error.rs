//! Errors raised while authenticating a streaming connection.
//!
//! Every variant is terminal: the connection is closed with a policy
//! violation before any upstream work starts.

use thiserror::Error;

/// Credential Gate failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// First frame was binary audio instead of the credential message
    #[error("Expected a text credential message as the first frame")]
    NotText,

    /// Credential message is not valid JSON of the expected shape
    #[error("Invalid credential payload: {0}")]
    InvalidPayload(String),

    /// A mandatory field is absent or blank
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Region has no streaming transcription endpoint
    #[error("Unsupported region: {0}")]
    UnsupportedRegion(String),

    /// No credential message arrived in time
    #[error("Timed out waiting for credentials")]
    Timeout,

    /// Client went away before authenticating
    #[error("Connection closed before credentials were received")]
    ConnectionClosed,
}

impl AuthError {
    /// Short reason for the close frame (kept under the 123 byte limit).
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::NotText | Self::InvalidPayload(_) => "Invalid credential payload",
            Self::MissingField(_) => "Missing AWS credentials",
            Self::UnsupportedRegion(_) => "Unsupported region",
            Self::Timeout => "Authentication timeout",
            Self::ConnectionClosed => "Connection closed",
        }
    }
}

/// Result type for authentication
pub type AuthResult<T> = Result<T, AuthError>;
