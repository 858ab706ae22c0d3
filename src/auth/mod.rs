//! Credential handling.
//!
//! - `credentials`: per-connection credential message validation
//! - `instance`: instance role credentials from the metadata service
//! - `cache`: expiry-checked cache over the instance provider

mod cache;
mod credentials;
mod instance;

pub use cache::{CredentialCache, DEFAULT_REFRESH_MARGIN};
pub use credentials::{CredentialGate, CredentialHandle, CredentialPayload, CredentialResolver};
pub use instance::{
    CredentialError, DEFAULT_METADATA_SERVICE_URL, ImdsCredentialProvider,
    InstanceCredentialProvider, InstanceCredentials,
};
