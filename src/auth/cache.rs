use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::instance::{CredentialError, InstanceCredentialProvider, InstanceCredentials};

/// Credentials are refreshed this long before they expire.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Expiry-checked cache in front of an [`InstanceCredentialProvider`].
///
/// The lock is held across a refresh, so concurrent callers wait for the one
/// in-flight fetch instead of starting their own.
pub struct CredentialCache {
    provider: Arc<dyn InstanceCredentialProvider>,
    cached: Mutex<Option<InstanceCredentials>>,
    refresh_margin: Duration,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn InstanceCredentialProvider>) -> Self {
        Self::with_refresh_margin(provider, DEFAULT_REFRESH_MARGIN)
    }

    pub fn with_refresh_margin(
        provider: Arc<dyn InstanceCredentialProvider>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            provider,
            cached: Mutex::new(None),
            refresh_margin,
        }
    }

    fn is_fresh(&self, credentials: &InstanceCredentials) -> bool {
        credentials.expiration - self.refresh_margin > OffsetDateTime::now_utc()
    }

    /// Cached credentials, refreshed first if missing or about to expire.
    pub async fn get(&self) -> Result<InstanceCredentials, CredentialError> {
        let mut cached = self.cached.lock().await;

        if let Some(credentials) = cached.as_ref().filter(|c| self.is_fresh(c)) {
            debug!("Using cached instance credentials");
            return Ok(credentials.clone());
        }

        info!("Refreshing instance credentials");
        let credentials = self.provider.fetch().await?;
        *cached = Some(credentials.clone());
        Ok(credentials)
    }

    /// Drop the cached credentials so the next `get` refetches.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("refresh_margin", &self.refresh_margin)
            .finish_non_exhaustive()
    }
}
