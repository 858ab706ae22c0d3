use std::time::Duration;

use super::{ConfigError, ServerConfig};
use crate::core::stt::MAX_AUDIO_CHUNK_SIZE;
use crate::core::stt::aws_transcribe::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};

/// Check the merged configuration for values the relay cannot run with.
pub fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.chunk_size == 0 || config.chunk_size > MAX_AUDIO_CHUNK_SIZE {
        return Err(ConfigError::Validation(format!(
            "chunk_size must be between 1 and {} bytes, got {}",
            MAX_AUDIO_CHUNK_SIZE, config.chunk_size
        )));
    }

    if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&config.sample_rate) {
        return Err(ConfigError::Validation(format!(
            "sample_rate must be between {} and {} Hz, got {}",
            MIN_SAMPLE_RATE, MAX_SAMPLE_RATE, config.sample_rate
        )));
    }

    if config.language_code.trim().is_empty() {
        return Err(ConfigError::Validation(
            "language_code must not be empty".to_string(),
        ));
    }

    for (name, value) in [
        ("keep_alive_interval", config.keep_alive_interval),
        ("inactivity_timeout", config.inactivity_timeout),
        ("auth_timeout", config.auth_timeout),
        ("drain_timeout", config.drain_timeout),
        ("engine_connect_timeout", config.engine_connect_timeout),
        (
            "transcription_job_poll_interval",
            config.transcription_job_poll_interval,
        ),
        ("transcription_job_timeout", config.transcription_job_timeout),
    ] {
        if value == Duration::ZERO {
            return Err(ConfigError::Validation(format!(
                "{} must be greater than zero",
                name
            )));
        }
    }

    if !(config.metadata_service_url.starts_with("http://")
        || config.metadata_service_url.starts_with("https://"))
    {
        return Err(ConfigError::Validation(format!(
            "metadata_service_url must be an http(s) URL, got '{}'",
            config.metadata_service_url
        )));
    }

    if config.upload_max_bytes == 0 {
        return Err(ConfigError::Validation(
            "upload_max_bytes must be greater than zero".to_string(),
        ));
    }

    for (name, model) in &config.models {
        if model.id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "model '{}' has an empty id",
                name
            )));
        }
        if !(0.0..=1.0).contains(&model.temperature) || !(0.0..=1.0).contains(&model.top_p) {
            return Err(ConfigError::Validation(format!(
                "model '{}': temperature and top_p must be between 0 and 1",
                name
            )));
        }
        if model.max_tokens <= 0 {
            return Err(ConfigError::Validation(format!(
                "model '{}': max_tokens must be greater than zero",
                name
            )));
        }
    }

    if config.rate_limit_requests_per_second == 0 || config.rate_limit_burst_size == 0 {
        return Err(ConfigError::Validation(
            "rate limit values must be greater than zero".to_string(),
        ));
    }

    if config.max_connections_per_ip == 0 || config.max_websocket_connections == Some(0) {
        return Err(ConfigError::Validation(
            "connection limits must be greater than zero".to_string(),
        ));
    }

    if let Some(tls) = &config.tls {
        for path in [&tls.cert_path, &tls.key_path] {
            if !path.exists() {
                return Err(ConfigError::Validation(format!(
                    "TLS file not found: {}",
                    path.display()
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;
    use crate::core::llm::ModelSpec;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_server_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_chunk_size_bounds() {
        let config = ServerConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(validate_server_config(&config).is_err());

        let config = ServerConfig {
            chunk_size: MAX_AUDIO_CHUNK_SIZE + 1,
            ..Default::default()
        };
        assert!(validate_server_config(&config).is_err());
    }

    #[test]
    fn test_sample_rate_bounds() {
        let config = ServerConfig {
            sample_rate: 96000,
            ..Default::default()
        };
        let err = validate_server_config(&config).unwrap_err();
        assert!(err.to_string().contains("sample_rate"));
    }

    #[test]
    fn test_zero_durations_rejected() {
        let config = ServerConfig {
            keep_alive_interval: Duration::ZERO,
            ..Default::default()
        };
        let err = validate_server_config(&config).unwrap_err();
        assert!(err.to_string().contains("keep_alive_interval"));
    }

    #[test]
    fn test_metadata_url_scheme() {
        let config = ServerConfig {
            metadata_service_url: "169.254.169.254/latest".to_string(),
            ..Default::default()
        };
        assert!(validate_server_config(&config).is_err());
    }

    #[test]
    fn test_missing_tls_files_rejected() {
        let config = ServerConfig {
            tls: Some(TlsConfig {
                cert_path: PathBuf::from("/nonexistent/cert.pem"),
                key_path: PathBuf::from("/nonexistent/key.pem"),
            }),
            ..Default::default()
        };
        let err = validate_server_config(&config).unwrap_err();
        assert!(err.to_string().contains("TLS file not found"));
    }

    #[test]
    fn test_zero_upload_limit_rejected() {
        let config = ServerConfig {
            upload_max_bytes: 0,
            ..Default::default()
        };
        let err = validate_server_config(&config).unwrap_err();
        assert!(err.to_string().contains("upload_max_bytes"));
    }

    #[test]
    fn test_model_settings_checked() {
        let mut config = ServerConfig::default();
        config
            .models
            .insert("hot".to_string(), ModelSpec::new("some.model-v1:0"));
        config.models.get_mut("hot").unwrap().temperature = 1.5;
        let err = validate_server_config(&config).unwrap_err();
        assert!(err.to_string().contains("'hot'"));

        let mut config = ServerConfig::default();
        config.models.insert("blank".to_string(), ModelSpec::new(" "));
        assert!(validate_server_config(&config).is_err());
    }

    #[test]
    fn test_zero_connection_limit_rejected() {
        let config = ServerConfig {
            max_websocket_connections: Some(0),
            ..Default::default()
        };
        assert!(validate_server_config(&config).is_err());
    }
}
