use std::path::PathBuf;
use std::time::Duration;

use super::env::load_env_config;
use crate::core::llm::ModelSpec;
use super::yaml::YamlConfig;
use super::{
    ConfigError, ServerConfig, TlsConfig, parse_encoding, parse_provider, parse_region,
    parse_stability,
};

/// Merge environment configuration (base) with YAML overrides.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = load_env_config()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                Some(true) => {
                    let cert_path = tls.cert_path.ok_or_else(|| {
                        ConfigError::invalid("server.tls.cert_path", "required when TLS is enabled")
                    })?;
                    let key_path = tls.key_path.ok_or_else(|| {
                        ConfigError::invalid("server.tls.key_path", "required when TLS is enabled")
                    })?;
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert_path),
                        key_path: PathBuf::from(key_path),
                    });
                }
                None => {}
            }
        }
    }

    if let Some(transcription) = yaml.transcription {
        if let Some(provider) = transcription.provider {
            config.stt_provider = parse_provider("transcription.provider", &provider)?;
        }
        if let Some(region) = transcription.default_region {
            config.default_region = parse_region("transcription.default_region", &region)?;
        }
        if let Some(language) = transcription.language_code {
            config.language_code = language;
        }
        if let Some(sample_rate) = transcription.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(encoding) = transcription.encoding {
            config.encoding = parse_encoding("transcription.encoding", &encoding)?;
        }
        if let Some(stability) = transcription.partial_results_stability {
            config.partial_results_stability =
                parse_stability("transcription.partial_results_stability", &stability)?;
        }
        if let Some(secs) = transcription.connect_timeout_seconds {
            config.engine_connect_timeout = Duration::from_secs(secs);
        }
    }

    if let Some(session) = yaml.session {
        if let Some(chunk_size) = session.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(secs) = session.keep_alive_interval_seconds {
            config.keep_alive_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = session.inactivity_timeout_seconds {
            config.inactivity_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = session.auth_timeout_seconds {
            config.auth_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = session.drain_timeout_seconds {
            config.drain_timeout = Duration::from_secs(secs);
        }
    }

    if let Some(url) = yaml.metadata.and_then(|m| m.service_url) {
        config.metadata_service_url = url;
    }

    if let Some(storage) = yaml.storage {
        if let Some(endpoint) = storage.endpoint {
            config.s3_endpoint = Some(endpoint);
        }
        if let Some(max) = storage.max_upload_bytes {
            config.upload_max_bytes = max;
        }
    }

    if let Some(inference) = yaml.inference {
        if let Some(url) = inference.endpoint_url {
            config.aws_endpoint_url = Some(url);
        }
        if let Some(ms) = inference.job_poll_interval_ms {
            config.transcription_job_poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = inference.job_timeout_seconds {
            config.transcription_job_timeout = Duration::from_secs(secs);
        }
        if let Some(models) = inference.models {
            config.models = models
                .into_iter()
                .map(|(name, model)| {
                    let mut spec = ModelSpec::new(model.id);
                    if let Some(temperature) = model.temperature {
                        spec.temperature = temperature;
                    }
                    if let Some(top_p) = model.top_p {
                        spec.top_p = top_p;
                    }
                    if let Some(max_tokens) = model.max_tokens {
                        spec.max_tokens = max_tokens;
                    }
                    (name, spec)
                })
                .collect();
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if let Some(max) = security.max_websocket_connections {
            config.max_websocket_connections = Some(max);
        }
        if let Some(max) = security.max_connections_per_ip {
            config.max_connections_per_ip = max;
        }
    }

    Ok(config)
}
