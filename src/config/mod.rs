//! Configuration module for the relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use transcribe_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::auth::DEFAULT_METADATA_SERVICE_URL;
use crate::core::llm::{ModelSpec, default_models};
use crate::core::session::{
    DEFAULT_AUTH_TIMEOUT, DEFAULT_CHUNK_SIZE, DEFAULT_DRAIN_TIMEOUT, DEFAULT_INACTIVITY_TIMEOUT,
    DEFAULT_KEEP_ALIVE_INTERVAL, SessionSettings,
};
use crate::core::stt::aws_transcribe::{
    DEFAULT_CONNECT_TIMEOUT_SECS, PartialResultsStability, RECOMMENDED_SAMPLE_RATE,
};
use crate::core::stt::batch::{DEFAULT_JOB_POLL_INTERVAL, DEFAULT_JOB_TIMEOUT};
use crate::core::stt::{AwsRegion, AwsTranscribeConfig, MediaEncoding, STTProvider, StreamConfig};

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Largest accepted `/api/upload` request body.
pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 100 * 1024 * 1024;

/// Configuration loading and validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the relay, including:
/// - Server settings (host, port, TLS)
/// - Streaming engine settings (region, language, audio format)
/// - Session timing (chunk size, keep-alive, timeouts)
/// - Instance metadata service location and upload storage endpoint
/// - Transcription jobs and text generation models
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Streaming engine
    pub stt_provider: STTProvider,
    /// Region used when the client credential message omits one
    pub default_region: AwsRegion,
    pub language_code: String,
    pub sample_rate: u32,
    pub encoding: MediaEncoding,
    /// `None` disables partial results stabilization
    pub partial_results_stability: Option<PartialResultsStability>,
    pub engine_connect_timeout: Duration,

    // Session timing
    pub chunk_size: usize,
    pub keep_alive_interval: Duration,
    pub inactivity_timeout: Duration,
    pub auth_timeout: Duration,
    pub drain_timeout: Duration,

    /// Base URL of the instance metadata service
    pub metadata_service_url: String,

    /// Custom S3-compatible endpoint for uploads (e.g. MinIO). `None` uses AWS.
    pub s3_endpoint: Option<String>,
    /// Request body cap for `/api/upload`
    pub upload_max_bytes: usize,

    /// Endpoint override for the Transcribe job and Bedrock clients
    pub aws_endpoint_url: Option<String>,
    pub transcription_job_poll_interval: Duration,
    pub transcription_job_timeout: Duration,
    /// Models `/api/transcribe` and `/api/bedrock` accept, by request name
    pub models: BTreeMap<String, ModelSpec>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            tls: None,
            stt_provider: STTProvider::AwsTranscribe,
            default_region: AwsRegion::UsWest2,
            language_code: "en-US".to_string(),
            sample_rate: RECOMMENDED_SAMPLE_RATE,
            encoding: MediaEncoding::Pcm,
            partial_results_stability: Some(PartialResultsStability::High),
            engine_connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            metadata_service_url: DEFAULT_METADATA_SERVICE_URL.to_string(),
            s3_endpoint: None,
            upload_max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
            aws_endpoint_url: None,
            transcription_job_poll_interval: DEFAULT_JOB_POLL_INTERVAL,
            transcription_job_timeout: DEFAULT_JOB_TIMEOUT,
            models: default_models(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables over defaults, then validate.
    ///
    /// The `.env` file is loaded in `main` before this is called, so actual
    /// environment variables override `.env` values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate_server_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_server_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Audio format requested from the engine for every session.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            language_code: self.language_code.clone(),
            sample_rate_hz: self.sample_rate,
            encoding: self.encoding,
        }
    }

    /// Per-session timing and chunking.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            chunk_size: self.chunk_size,
            keep_alive_interval: self.keep_alive_interval,
            inactivity_timeout: self.inactivity_timeout,
            auth_timeout: self.auth_timeout,
            drain_timeout: self.drain_timeout,
            stream: self.stream_config(),
        }
    }

    /// Engine-wide settings.
    pub fn engine_config(&self) -> AwsTranscribeConfig {
        AwsTranscribeConfig {
            enable_partial_results_stabilization: self.partial_results_stability.is_some(),
            partial_results_stability: self.partial_results_stability.unwrap_or_default(),
            connect_timeout_secs: self.engine_connect_timeout.as_secs(),
        }
    }
}

/// Parse a region name, rejecting regions without streaming transcription.
pub(crate) fn parse_region(key: &str, value: &str) -> Result<AwsRegion, ConfigError> {
    AwsRegion::parse(value).ok_or_else(|| {
        ConfigError::invalid(key, format!("unsupported region '{}'", value))
    })
}

pub(crate) fn parse_encoding(key: &str, value: &str) -> Result<MediaEncoding, ConfigError> {
    value
        .parse::<MediaEncoding>()
        .map_err(|e| ConfigError::invalid(key, e))
}

/// `off`, `none` and `disabled` turn stabilization off.
pub(crate) fn parse_stability(
    key: &str,
    value: &str,
) -> Result<Option<PartialResultsStability>, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "off" | "none" | "disabled" => Ok(None),
        other => other
            .parse::<PartialResultsStability>()
            .map(Some)
            .map_err(|e| ConfigError::invalid(key, e)),
    }
}

pub(crate) fn parse_provider(key: &str, value: &str) -> Result<STTProvider, ConfigError> {
    value
        .parse::<STTProvider>()
        .map_err(|e| ConfigError::invalid(key, e.to_string()))
}
