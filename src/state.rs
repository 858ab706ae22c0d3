//! Shared application state.
//!
//! Holds the only state shared across sessions: the session registry, the
//! instance credential cache, the streaming engine, the transcription job and
//! text generation backends, and the connection counters used by the
//! connection limit middleware.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use crate::auth::{
    CredentialCache, CredentialGate, CredentialResolver, ImdsCredentialProvider,
    InstanceCredentialProvider,
};
use crate::config::ServerConfig;
use crate::core::llm::{BedrockGenerator, TextGenerator};
use crate::core::session::{SessionContext, SessionRegistry};
use crate::core::stt::{
    AwsBatchTranscriber, BatchTranscriber, StreamingEngine, create_streaming_engine,
};

/// Reason a new WebSocket connection was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
    PerIpLimitReached,
}

pub struct AppState {
    pub config: ServerConfig,
    pub sessions: Arc<SessionRegistry>,
    pub engine: Arc<dyn StreamingEngine>,
    pub credential_gate: CredentialGate,
    pub instance_credentials: Arc<CredentialCache>,
    pub transcriber: Arc<dyn BatchTranscriber>,
    pub generator: Arc<dyn TextGenerator>,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, u32>,
}

impl AppState {
    /// Build the production state: the configured engine and the IMDSv2 provider.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let engine = create_streaming_engine(config.stt_provider, config.engine_config());
        let provider = Arc::new(ImdsCredentialProvider::new(
            config.metadata_service_url.clone(),
            config.default_region,
        ));

        info!(
            engine = engine.provider_info(),
            default_region = %config.default_region,
            "Application state initialized"
        );

        Self::with_components(config, engine, provider)
    }

    /// Build state around an explicit engine and credential provider, with the
    /// AWS transcription job and Bedrock backends from `config`.
    pub fn with_components(
        config: ServerConfig,
        engine: Arc<dyn StreamingEngine>,
        provider: Arc<dyn InstanceCredentialProvider>,
    ) -> Arc<Self> {
        let transcriber = Arc::new(AwsBatchTranscriber::new(
            config.aws_endpoint_url.clone(),
            config.language_code.clone(),
            config.transcription_job_poll_interval,
            config.transcription_job_timeout,
        ));
        let generator = Arc::new(BedrockGenerator::new(config.aws_endpoint_url.clone()));

        Self::with_services(config, engine, provider, transcriber, generator)
    }

    /// Build state with every backend supplied by the caller.
    pub fn with_services(
        config: ServerConfig,
        engine: Arc<dyn StreamingEngine>,
        provider: Arc<dyn InstanceCredentialProvider>,
        transcriber: Arc<dyn BatchTranscriber>,
        generator: Arc<dyn TextGenerator>,
    ) -> Arc<Self> {
        let credential_gate = CredentialGate::new(CredentialResolver::new(config.default_region));

        Arc::new(Self {
            config,
            sessions: Arc::new(SessionRegistry::new()),
            engine,
            credential_gate,
            instance_credentials: Arc::new(CredentialCache::new(provider)),
            transcriber,
            generator,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Services handed to each session controller.
    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            registry: self.sessions.clone(),
            engine: self.engine.clone(),
            gate: self.credential_gate,
            settings: self.config.session_settings(),
        }
    }

    /// Reserve a connection slot for `ip`.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let max_global = self.config.max_websocket_connections.unwrap_or(usize::MAX);
        self.ws_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < max_global).then_some(current + 1)
            })
            .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;

        match self.ip_connections.entry(ip) {
            Entry::Occupied(mut entry) => {
                if *entry.get() >= self.config.max_connections_per_ip {
                    self.ws_connections.fetch_sub(1, Ordering::SeqCst);
                    return Err(ConnectionLimitError::PerIpLimitReached);
                }
                *entry.get_mut() += 1;
            }
            Entry::Vacant(entry) => {
                entry.insert(1);
            }
        }
        Ok(())
    }

    /// Release a slot taken with `try_acquire_connection`.
    pub fn release_connection(&self, ip: IpAddr) {
        let released = match self.ip_connections.entry(ip) {
            Entry::Occupied(mut entry) => {
                if *entry.get() <= 1 {
                    entry.remove();
                } else {
                    *entry.get_mut() -= 1;
                }
                true
            }
            Entry::Vacant(_) => false,
        };

        if released {
            let _ = self
                .ws_connections
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));
        }
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::SeqCst)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> u32 {
        self.ip_connections.get(ip).map(|count| *count).unwrap_or(0)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine.provider_info())
            .field("generator", &self.generator.provider_info())
            .field("sessions", &self.sessions.len())
            .field("ws_connections", &self.ws_connection_count())
            .finish_non_exhaustive()
    }
}
