use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   tls:
///     enabled: true
///     cert_path: "/etc/relay/cert.pem"
///     key_path: "/etc/relay/key.pem"
///
/// transcription:
///   provider: "aws-transcribe"
///   default_region: "us-west-2"
///   language_code: "en-US"
///   sample_rate: 16000
///   encoding: "pcm"
///   partial_results_stability: "high"
///
/// session:
///   chunk_size: 4096
///   keep_alive_interval_seconds: 5
///   inactivity_timeout_seconds: 30
///   auth_timeout_seconds: 10
///   drain_timeout_seconds: 5
///
/// metadata:
///   service_url: "http://169.254.169.254/latest"
///
/// storage:
///   endpoint: "http://localhost:9000"
///   max_upload_bytes: 104857600
///
/// inference:
///   endpoint_url: "http://localhost:4566"
///   job_poll_interval_ms: 1000
///   job_timeout_seconds: 600
///   models:
///     claude-3-haiku:
///       id: "anthropic.claude-3-haiku-20240307-v1:0"
///       temperature: 0.5
///       top_p: 0.9
///       max_tokens: 1000
///
/// security:
///   cors_allowed_origins: "https://example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 1000
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub transcription: Option<TranscriptionYaml>,
    pub session: Option<SessionYaml>,
    pub metadata: Option<MetadataYaml>,
    pub storage: Option<StorageYaml>,
    pub inference: Option<InferenceYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Streaming engine settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TranscriptionYaml {
    pub provider: Option<String>,
    /// Region used when a client does not send one
    pub default_region: Option<String>,
    pub language_code: Option<String>,
    pub sample_rate: Option<u32>,
    pub encoding: Option<String>,
    /// "high", "medium", "low", or "off"
    pub partial_results_stability: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Session timing from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub chunk_size: Option<usize>,
    pub keep_alive_interval_seconds: Option<u64>,
    pub inactivity_timeout_seconds: Option<u64>,
    pub auth_timeout_seconds: Option<u64>,
    pub drain_timeout_seconds: Option<u64>,
}

/// Instance metadata service settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MetadataYaml {
    pub service_url: Option<String>,
}

/// Upload storage settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    /// S3-compatible endpoint; omit for AWS
    pub endpoint: Option<String>,
    pub max_upload_bytes: Option<usize>,
}

/// Transcription job and text generation settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InferenceYaml {
    /// Endpoint override for the Transcribe job and Bedrock clients
    pub endpoint_url: Option<String>,
    pub job_poll_interval_ms: Option<u64>,
    pub job_timeout_seconds: Option<u64>,
    /// Replaces the built-in model table when present
    pub models: Option<BTreeMap<String, ModelYaml>>,
}

/// One model entry. Omitted sampling settings use the built-in defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelYaml {
    pub id: String,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<i32>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
    /// Maximum concurrent WebSocket connections
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml(e.to_string()))
    }
}
