//! Environment variable loading.
//!
//! | Variable | Field |
//! |---|---|
//! | `HOST`, `PORT` | server address |
//! | `TLS_ENABLED`, `TLS_CERT_PATH`, `TLS_KEY_PATH` | TLS |
//! | `STT_PROVIDER` | streaming engine |
//! | `AWS_REGION` (or `DEFAULT_AWS_REGION`) | default client region |
//! | `TRANSCRIBE_LANGUAGE_CODE`, `TRANSCRIBE_SAMPLE_RATE`, `TRANSCRIBE_ENCODING` | audio format |
//! | `TRANSCRIBE_PARTIAL_STABILITY` | partial results stabilization |
//! | `TRANSCRIBE_CONNECT_TIMEOUT_SECONDS` | engine start timeout |
//! | `AUDIO_CHUNK_SIZE` | upstream chunk size |
//! | `KEEP_ALIVE_INTERVAL_SECONDS`, `INACTIVITY_TIMEOUT_SECONDS` | session timing |
//! | `AUTH_TIMEOUT_SECONDS`, `DRAIN_TIMEOUT_SECONDS` | session timing |
//! | `METADATA_SERVICE_URL` | instance metadata service |
//! | `S3_ENDPOINT`, `UPLOAD_MAX_BYTES` | upload storage endpoint and body cap |
//! | `AWS_ENDPOINT_URL` | Transcribe job and Bedrock endpoint |
//! | `TRANSCRIPTION_JOB_POLL_INTERVAL_MS`, `TRANSCRIPTION_JOB_TIMEOUT_SECONDS` | transcription jobs |
//! | `CORS_ALLOWED_ORIGINS` | CORS |
//! | `RATE_LIMIT_REQUESTS_PER_SECOND`, `RATE_LIMIT_BURST_SIZE` | rate limiting |
//! | `MAX_WEBSOCKET_CONNECTIONS`, `MAX_CONNECTIONS_PER_IP` | connection limits |

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{
    ConfigError, ServerConfig, TlsConfig, parse_encoding, parse_provider, parse_region,
    parse_stability,
};

/// Read a variable, treating empty values as unset.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    env_string(key)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| ConfigError::invalid(key, format!("'{}': {}", v, e)))
        })
        .transpose()
}

fn env_seconds(key: &str) -> Result<Option<Duration>, ConfigError> {
    Ok(env_parse::<u64>(key)?.map(Duration::from_secs))
}

fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    env_string(key)
        .map(|v| match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::invalid(key, format!("expected a boolean, got '{}'", v))),
        })
        .transpose()
}

/// Build a configuration from defaults overridden by environment variables.
pub fn load_env_config() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();

    if let Some(host) = env_string("HOST") {
        config.host = host;
    }
    if let Some(port) = env_parse("PORT")? {
        config.port = port;
    }

    if env_bool("TLS_ENABLED")?.unwrap_or(false) {
        let cert_path = env_string("TLS_CERT_PATH")
            .ok_or_else(|| ConfigError::invalid("TLS_CERT_PATH", "required when TLS_ENABLED"))?;
        let key_path = env_string("TLS_KEY_PATH")
            .ok_or_else(|| ConfigError::invalid("TLS_KEY_PATH", "required when TLS_ENABLED"))?;
        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        });
    }

    if let Some(provider) = env_string("STT_PROVIDER") {
        config.stt_provider = parse_provider("STT_PROVIDER", &provider)?;
    }
    if let Some(region) = env_string("AWS_REGION") {
        config.default_region = parse_region("AWS_REGION", &region)?;
    } else if let Some(region) = env_string("DEFAULT_AWS_REGION") {
        config.default_region = parse_region("DEFAULT_AWS_REGION", &region)?;
    }
    if let Some(language) = env_string("TRANSCRIBE_LANGUAGE_CODE") {
        config.language_code = language;
    }
    if let Some(sample_rate) = env_parse("TRANSCRIBE_SAMPLE_RATE")? {
        config.sample_rate = sample_rate;
    }
    if let Some(encoding) = env_string("TRANSCRIBE_ENCODING") {
        config.encoding = parse_encoding("TRANSCRIBE_ENCODING", &encoding)?;
    }
    if let Some(stability) = env_string("TRANSCRIBE_PARTIAL_STABILITY") {
        config.partial_results_stability =
            parse_stability("TRANSCRIBE_PARTIAL_STABILITY", &stability)?;
    }
    if let Some(timeout) = env_seconds("TRANSCRIBE_CONNECT_TIMEOUT_SECONDS")? {
        config.engine_connect_timeout = timeout;
    }

    if let Some(chunk_size) = env_parse("AUDIO_CHUNK_SIZE")? {
        config.chunk_size = chunk_size;
    }
    if let Some(interval) = env_seconds("KEEP_ALIVE_INTERVAL_SECONDS")? {
        config.keep_alive_interval = interval;
    }
    if let Some(timeout) = env_seconds("INACTIVITY_TIMEOUT_SECONDS")? {
        config.inactivity_timeout = timeout;
    }
    if let Some(timeout) = env_seconds("AUTH_TIMEOUT_SECONDS")? {
        config.auth_timeout = timeout;
    }
    if let Some(timeout) = env_seconds("DRAIN_TIMEOUT_SECONDS")? {
        config.drain_timeout = timeout;
    }

    if let Some(url) = env_string("METADATA_SERVICE_URL") {
        config.metadata_service_url = url;
    }

    if let Some(endpoint) = env_string("S3_ENDPOINT") {
        config.s3_endpoint = Some(endpoint);
    }
    if let Some(max) = env_parse("UPLOAD_MAX_BYTES")? {
        config.upload_max_bytes = max;
    }

    if let Some(url) = env_string("AWS_ENDPOINT_URL") {
        config.aws_endpoint_url = Some(url);
    }
    if let Some(ms) = env_parse::<u64>("TRANSCRIPTION_JOB_POLL_INTERVAL_MS")? {
        config.transcription_job_poll_interval = Duration::from_millis(ms);
    }
    if let Some(timeout) = env_seconds("TRANSCRIPTION_JOB_TIMEOUT_SECONDS")? {
        config.transcription_job_timeout = timeout;
    }

    if let Some(origins) = env_string("CORS_ALLOWED_ORIGINS") {
        config.cors_allowed_origins = Some(origins);
    }
    if let Some(rps) = env_parse("RATE_LIMIT_REQUESTS_PER_SECOND")? {
        config.rate_limit_requests_per_second = rps;
    }
    if let Some(burst) = env_parse("RATE_LIMIT_BURST_SIZE")? {
        config.rate_limit_burst_size = burst;
    }
    if let Some(max) = env_parse("MAX_WEBSOCKET_CONNECTIONS")? {
        config.max_websocket_connections = Some(max);
    }
    if let Some(max) = env_parse("MAX_CONNECTIONS_PER_IP")? {
        config.max_connections_per_ip = max;
    }

    Ok(config)
}
