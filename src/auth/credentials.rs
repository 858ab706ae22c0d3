//! Client credential handling for streaming sessions.
//!
//! The first frame on a streaming connection carries the caller's AWS
//! credentials as JSON. [`CredentialGate`] validates that frame and turns it
//! into a [`CredentialHandle`] the engine adapter can sign requests with.

use serde::Deserialize;
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::session::ClientFrame;
use crate::core::stt::AwsRegion;
use crate::errors::{AuthError, AuthResult};

/// Credential message as sent by the client.
///
/// Accepts both snake_case and the camelCase names used by the AWS SDKs.
/// Absent keys deserialize to `None`.
#[derive(Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPayload {
    #[serde(alias = "accessKeyId", alias = "access_key_id")]
    pub access_key: Option<String>,
    #[serde(alias = "secretAccessKey", alias = "secret_access_key")]
    pub secret_key: Option<String>,
    pub region: Option<String>,
    #[serde(alias = "sessionToken", alias = "token")]
    pub session_token: Option<String>,
}

impl fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPayload")
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .field("region", &self.region)
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Validated engine credentials plus the resolved region.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CredentialHandle {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    #[zeroize(skip)]
    region: AwsRegion,
}

impl CredentialHandle {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
        region: AwsRegion,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
            region,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn region(&self) -> AwsRegion {
        self.region
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHandle")
            .field("access_key_id", &"[REDACTED]")
            .field("secret_access_key", &"[REDACTED]")
            .field("has_session_token", &self.session_token.is_some())
            .field("region", &self.region)
            .finish()
    }
}

/// Turns raw credential fields into a [`CredentialHandle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialResolver {
    default_region: AwsRegion,
}

impl CredentialResolver {
    pub fn new(default_region: AwsRegion) -> Self {
        Self { default_region }
    }

    pub fn default_region(&self) -> AwsRegion {
        self.default_region
    }

    /// Validate credential fields. Blank strings count as absent.
    pub fn resolve(
        &self,
        access_key: Option<&str>,
        secret_key: Option<&str>,
        region: Option<&str>,
        session_token: Option<&str>,
    ) -> AuthResult<CredentialHandle> {
        let access_key = non_blank(access_key).ok_or(AuthError::MissingField("access_key"))?;
        let secret_key = non_blank(secret_key).ok_or(AuthError::MissingField("secret_key"))?;

        let region = match non_blank(region) {
            Some(name) => AwsRegion::parse(name)
                .ok_or_else(|| AuthError::UnsupportedRegion(name.to_string()))?,
            None => self.default_region,
        };

        Ok(CredentialHandle::new(
            access_key,
            secret_key,
            non_blank(session_token).map(str::to_string),
            region,
        ))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validates the first message of a streaming connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialGate {
    resolver: CredentialResolver,
}

impl CredentialGate {
    pub fn new(resolver: CredentialResolver) -> Self {
        Self { resolver }
    }

    /// Parse a credential JSON document.
    pub fn parse_credentials(&self, message: &str) -> AuthResult<CredentialHandle> {
        let payload: CredentialPayload = serde_json::from_str(message)
            .map_err(|e| AuthError::InvalidPayload(e.to_string()))?;

        debug!(payload = ?payload, "Received credential message");

        self.resolver.resolve(
            payload.access_key.as_deref(),
            payload.secret_key.as_deref(),
            payload.region.as_deref(),
            payload.session_token.as_deref(),
        )
    }

    /// Validate the first client frame. `None` means the stream ended first.
    pub fn check_frame(&self, frame: Option<ClientFrame>) -> AuthResult<CredentialHandle> {
        match frame {
            Some(ClientFrame::Text(text)) => self.parse_credentials(&text),
            Some(ClientFrame::Audio(_)) => Err(AuthError::NotText),
            Some(ClientFrame::Close) | None => Err(AuthError::ConnectionClosed),
        }
    }
}
