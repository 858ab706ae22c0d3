//! Temporary credentials from the EC2 instance metadata service (IMDSv2).
//!
//! The flow is:
//! 1. `PUT {base}/api/token` for a session token
//! 2. `GET {base}/meta-data/iam/security-credentials/` for the role name
//! 3. `GET {base}/meta-data/iam/security-credentials/{role}` for the credentials
//! 4. `GET {base}/meta-data/placement/region`, falling back to the default region

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::core::stt::AwsRegion;

/// Default metadata service endpoint.
pub const DEFAULT_METADATA_SERVICE_URL: &str = "http://169.254.169.254/latest";

const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const TOKEN_TTL_SECONDS: &str = "21600";
const TOKEN_TIMEOUT: Duration = Duration::from_secs(2);
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);
const SDK_PROVIDER_NAME: &str = "instance-role";

/// Errors from instance credential retrieval.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Failed to fetch IMDSv2 token: {0}")]
    Token(String),

    #[error("Failed to fetch instance metadata: {0}")]
    Metadata(String),

    #[error("No IAM role found")]
    NoRole,

    #[error("Failed to parse temporary credentials: {0}")]
    InvalidResponse(String),
}

/// Temporary credentials of the instance role.
#[derive(Clone, PartialEq, Eq)]
pub struct InstanceCredentials {
    pub role: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: OffsetDateTime,
}

impl fmt::Debug for InstanceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCredentials")
            .field("role", &self.role)
            .field("region", &self.region)
            .field("access_key_id", &"[REDACTED]")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl InstanceCredentials {
    /// SDK configuration signing with these credentials in their region.
    ///
    /// `endpoint_url` overrides the service endpoint for every client built
    /// from the result.
    pub async fn sdk_config(&self, endpoint_url: Option<&str>) -> SdkConfig {
        let credentials = aws_credential_types::Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            Some(self.session_token.clone()),
            Some(SystemTime::from(self.expiration)),
            SDK_PROVIDER_NAME,
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(credentials);
        if let Some(url) = endpoint_url {
            loader = loader.endpoint_url(url);
        }
        loader.load().await
    }
}

/// Source of instance role credentials.
#[async_trait]
pub trait InstanceCredentialProvider: Send + Sync {
    async fn fetch(&self) -> Result<InstanceCredentials, CredentialError>;
}

/// Credential document returned by the metadata service.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImdsCredentialDocument {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,
}

/// IMDSv2 client.
#[derive(Debug, Clone)]
pub struct ImdsCredentialProvider {
    client: Client,
    base_url: String,
    default_region: AwsRegion,
}

impl ImdsCredentialProvider {
    pub fn new(base_url: impl Into<String>, default_region: AwsRegion) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_region,
        }
    }

    async fn fetch_token(&self) -> Result<String, CredentialError> {
        let response = self
            .client
            .put(format!("{}/api/token", self.base_url))
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CredentialError::Token(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| CredentialError::Token(e.to_string()))
    }

    async fn get_metadata(&self, token: &str, path: &str) -> Result<String, CredentialError> {
        let response = self
            .client
            .get(format!("{}/meta-data/{}", self.base_url, path))
            .header(TOKEN_HEADER, token)
            .timeout(METADATA_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CredentialError::Metadata(e.to_string()))?;

        response
            .text()
            .await
            .map_err(|e| CredentialError::Metadata(e.to_string()))
    }

    /// Instance region, or the default region if the lookup fails.
    pub async fn fetch_region(&self, token: &str) -> String {
        match self.get_metadata(token, "placement/region").await {
            Ok(region) if !region.trim().is_empty() => region.trim().to_string(),
            Ok(_) => self.default_region.to_string(),
            Err(e) => {
                warn!("Error fetching AWS region, using default: {}", e);
                self.default_region.to_string()
            }
        }
    }
}

#[async_trait]
impl InstanceCredentialProvider for ImdsCredentialProvider {
    async fn fetch(&self) -> Result<InstanceCredentials, CredentialError> {
        let token = self.fetch_token().await?;

        let role = self
            .get_metadata(&token, "iam/security-credentials/")
            .await?
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or(CredentialError::NoRole)?;

        let document = self
            .get_metadata(&token, &format!("iam/security-credentials/{}", role))
            .await?;
        let document: ImdsCredentialDocument = serde_json::from_str(&document)
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

        let expiration = OffsetDateTime::parse(&document.expiration, &Rfc3339)
            .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;

        let region = self.fetch_region(&token).await;

        info!(role = %role, region = %region, "Fetched temporary instance credentials");

        Ok(InstanceCredentials {
            role,
            region,
            access_key_id: document.access_key_id,
            secret_access_key: document.secret_access_key,
            session_token: document.token,
            expiration,
        })
    }
}
