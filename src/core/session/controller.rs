//! Session lifecycle controller.
//!
//! Drives one client connection through
//! `CONNECTING → AUTHENTICATING → STREAMING → DRAINING → CLOSED`.
//!
//! While streaming, three tasks share one cancellation scope:
//! - ingest: reads client frames, re-chunks audio, writes to the upstream sink
//! - keep-alive: writes silence to the sink on a timer
//! - events: reads engine events, aggregates them, queues text for the client
//!
//! The first of ingest or events to finish decides the [`SessionEnd`]. The
//! controller then drains: cancel the scope, await ingest and keep-alive,
//! flush the buffered remainder, end the upstream stream, and give the event
//! task a bounded window to deliver the last transcripts.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex as SyncMutex;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::aggregator::TranscriptAggregator;
use super::buffer::{AudioChunker, DEFAULT_CHUNK_SIZE};
use super::error::{SessionEnd, SessionError};
use super::keep_alive::{DEFAULT_KEEP_ALIVE_INTERVAL, KeepAlive};
use super::messages::{
    CLOSE_INTERNAL_ERROR, CLOSE_NORMAL, CLOSE_POLICY_VIOLATION, ClientFrame, IncomingControl,
    MessageRoute, OutgoingMessage,
};
use super::registry::{SessionEntry, SessionRegistry};
use super::state::{SessionState, StateHandle};
use crate::auth::{CredentialGate, CredentialHandle};
use crate::core::stt::{ChunkSink, StreamConfig, StreamingEngine, TranscriptStream};
use crate::errors::AuthError;

/// Default inactivity timeout.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);
/// Default time allowed for the credential message.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);
/// Default window for trailing transcripts after end-of-stream.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-session tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub chunk_size: usize,
    pub keep_alive_interval: Duration,
    pub inactivity_timeout: Duration,
    pub auth_timeout: Duration,
    pub drain_timeout: Duration,
    pub stream: StreamConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            stream: StreamConfig::default(),
        }
    }
}

/// Shared services a session needs.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: Arc<SessionRegistry>,
    pub engine: Arc<dyn StreamingEngine>,
    pub gate: CredentialGate,
    pub settings: SessionSettings,
}

/// Result of the ingest task. `end` is `None` when the task was cancelled.
struct IngestOutcome {
    end: Option<SessionEnd>,
    chunker: AudioChunker,
    frames: usize,
}

/// Drives a single session from accept to close.
pub struct SessionController {
    id: String,
    client_ip: Option<IpAddr>,
    inbound: BoxStream<'static, ClientFrame>,
    outbound: mpsc::Sender<MessageRoute>,
    state: StateHandle,
    aggregator: Arc<SyncMutex<TranscriptAggregator>>,
    ctx: SessionContext,
}

impl SessionController {
    /// The writer task draining `outbound` must already be running.
    pub fn new(
        id: impl Into<String>,
        client_ip: Option<IpAddr>,
        inbound: BoxStream<'static, ClientFrame>,
        outbound: mpsc::Sender<MessageRoute>,
        ctx: SessionContext,
    ) -> Self {
        Self {
            id: id.into(),
            client_ip,
            inbound,
            outbound,
            state: StateHandle::new(SessionState::Connecting),
            aggregator: Arc::new(SyncMutex::new(TranscriptAggregator::new())),
            ctx,
        }
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Run the session to completion.
    pub async fn run(mut self) -> SessionEnd {
        info!(session_id = %self.id, client_ip = ?self.client_ip, "Session connected");

        self.state.set(SessionState::Authenticating);
        let credentials = match self.authenticate().await {
            Ok(credentials) => credentials,
            Err(e) => return self.reject(e).await,
        };

        let entry = SessionEntry::new(self.id.clone(), self.state.clone(), self.client_ip);
        if let Err(e) = self.ctx.registry.insert(entry) {
            warn!(session_id = %self.id, "Rejecting session: {}", e);
            let end = SessionEnd::Failed(e.into());
            self.send_error(&end).await;
            self.send_close(CLOSE_POLICY_VIOLATION, "Session already active")
                .await;
            self.state.set(SessionState::Closed);
            return end;
        }

        info!(
            session_id = %self.id,
            region = %credentials.region(),
            engine = self.ctx.engine.provider_info(),
            "Session authenticated, starting upstream stream"
        );

        let upstream = match self
            .ctx
            .engine
            .start_stream(&credentials, &self.ctx.settings.stream)
            .await
        {
            Ok(upstream) => upstream,
            Err(e) => {
                error!(session_id = %self.id, "Upstream start failed: {}", e);
                self.state.set(SessionState::Draining);
                let end = SessionEnd::Failed(SessionError::UpstreamStart(e));
                self.close(end.clone()).await;
                return end;
            }
        };
        drop(credentials);

        let end = self.stream(upstream.sink, upstream.events).await;
        self.close(end.clone()).await;
        end
    }

    async fn authenticate(&mut self) -> Result<CredentialHandle, AuthError> {
        let frame = timeout(self.ctx.settings.auth_timeout, self.inbound.next())
            .await
            .map_err(|_| AuthError::Timeout)?;
        self.ctx.gate.check_frame(frame)
    }

    /// AUTHENTICATING → CLOSED. Nothing was registered or started.
    async fn reject(mut self, error: AuthError) -> SessionEnd {
        warn!(session_id = %self.id, client_ip = ?self.client_ip, "Authentication failed: {}", error);
        self.send_close(CLOSE_POLICY_VIOLATION, error.close_reason())
            .await;
        self.state.set(SessionState::Closed);
        SessionEnd::Failed(SessionError::Auth(error))
    }

    /// STREAMING and DRAINING.
    async fn stream(&mut self, sink: ChunkSink, events: TranscriptStream) -> SessionEnd {
        let settings = self.ctx.settings.clone();
        let sink = Arc::new(Mutex::new(sink));
        let cancel = CancellationToken::new();

        self.state.set(SessionState::Streaming);
        info!(session_id = %self.id, "Session streaming");

        let keep_alive = KeepAlive::new(
            self.id.clone(),
            sink.clone(),
            self.state.clone(),
            settings.keep_alive_interval,
            settings.chunk_size,
        );
        let keep_alive_task = tokio::spawn(keep_alive.run(cancel.clone()));

        let inbound = std::mem::replace(&mut self.inbound, futures::stream::empty().boxed());
        let mut ingest_task: JoinHandle<IngestOutcome> = tokio::spawn(run_ingest(
            self.id.clone(),
            inbound,
            sink.clone(),
            AudioChunker::new(settings.chunk_size),
            settings.inactivity_timeout,
            cancel.clone(),
        ));

        let mut event_task: JoinHandle<SessionEnd> = tokio::spawn(run_events(
            self.id.clone(),
            events,
            self.aggregator.clone(),
            self.outbound.clone(),
        ));

        let mut ingest_outcome = None;
        let mut event_end = None;

        let end = tokio::select! {
            result = &mut ingest_task => match result {
                Ok(outcome) => {
                    let end = outcome.end.clone().unwrap_or(SessionEnd::ClientDisconnect);
                    ingest_outcome = Some(outcome);
                    end
                }
                Err(e) => SessionEnd::Failed(SessionError::Task(format!("ingest: {}", e))),
            },
            result = &mut event_task => {
                let end = match result {
                    // Audio is still flowing, so a clean close here is a failure
                    Ok(SessionEnd::UpstreamClosed) => {
                        SessionEnd::Failed(SessionError::UpstreamClosedEarly)
                    }
                    Ok(end) => end,
                    Err(e) => SessionEnd::Failed(SessionError::Task(format!("events: {}", e))),
                };
                event_end = Some(end.clone());
                end
            }
        };

        // DRAINING
        self.state.set(SessionState::Draining);
        info!(session_id = %self.id, reason = end.label(), "Session draining");
        cancel.cancel();

        match keep_alive_task.await {
            Ok(sent) => debug!(session_id = %self.id, keep_alives = sent, "Keep-alive finished"),
            Err(e) => warn!(session_id = %self.id, "Keep-alive task failed: {}", e),
        }

        if ingest_outcome.is_none() {
            match ingest_task.await {
                Ok(outcome) => ingest_outcome = Some(outcome),
                Err(e) => warn!(session_id = %self.id, "Ingest task failed: {}", e),
            }
        }

        {
            let mut sink = sink.lock().await;

            if let Some(mut outcome) = ingest_outcome {
                debug!(session_id = %self.id, frames = outcome.frames, "Ingest finished");
                if let Some(rest) = outcome.chunker.flush() {
                    let len = rest.len();
                    match timeout(settings.drain_timeout, sink.send_chunk(rest)).await {
                        Ok(Ok(())) => {
                            debug!(session_id = %self.id, bytes = len, "Flushed final audio chunk")
                        }
                        Ok(Err(e)) => {
                            warn!(session_id = %self.id, "Failed to flush final audio chunk: {}", e)
                        }
                        Err(_) => {
                            warn!(session_id = %self.id, "Timed out flushing final audio chunk")
                        }
                    }
                }
            }

            sink.end_stream();
        }

        if event_end.is_none() {
            match timeout(settings.drain_timeout, &mut event_task).await {
                Ok(Ok(SessionEnd::Failed(e))) => {
                    warn!(session_id = %self.id, "Upstream failed while draining: {}", e)
                }
                Ok(Ok(_)) => debug!(session_id = %self.id, "Upstream drained"),
                Ok(Err(e)) => warn!(session_id = %self.id, "Event task failed: {}", e),
                Err(_) => {
                    warn!(
                        session_id = %self.id,
                        drain_timeout_ms = settings.drain_timeout.as_millis() as u64,
                        "Upstream did not finish in time, aborting event task"
                    );
                    event_task.abort();
                    let _ = event_task.await;
                }
            }
        }

        end
    }

    /// CLOSED. Entered once per registered session.
    async fn close(&mut self, end: SessionEnd) {
        if self.ctx.registry.remove(&self.id).is_none() {
            warn!(session_id = %self.id, "Session missing from registry at close");
        }

        let (aggregator_state, pending_partials) = {
            let aggregator = self.aggregator.lock();
            (aggregator.state(), aggregator.pending_partials())
        };

        if end.is_failure() {
            self.send_error(&end).await;
            self.send_close(CLOSE_INTERNAL_ERROR, "Transcription failed")
                .await;
            warn!(
                session_id = %self.id,
                reason = end.label(),
                aggregator_state = %aggregator_state,
                pending_partials,
                error = ?end.error(),
                "Session closed with error"
            );
        } else {
            self.send_close(CLOSE_NORMAL, "").await;
            info!(
                session_id = %self.id,
                reason = end.label(),
                aggregator_state = %aggregator_state,
                pending_partials,
                "Session closed"
            );
        }

        self.state.set(SessionState::Closed);
    }

    async fn send_error(&mut self, end: &SessionEnd) {
        if let Some(error) = end.error() {
            let route = MessageRoute::Outgoing(OutgoingMessage::Error {
                message: error.to_string(),
            });
            if self.outbound.send(route).await.is_err() {
                debug!(session_id = %self.id, "Client writer gone, error frame dropped");
            }
        }
    }

    async fn send_close(&mut self, code: u16, reason: &str) {
        let route = MessageRoute::Close {
            code,
            reason: reason.to_string(),
        };
        if self.outbound.send(route).await.is_err() {
            debug!(session_id = %self.id, "Client writer gone, close frame dropped");
        }
    }
}

/// Ingest task: client frames in, fixed-size chunks out.
async fn run_ingest(
    session_id: String,
    mut inbound: BoxStream<'static, ClientFrame>,
    sink: Arc<Mutex<ChunkSink>>,
    mut chunker: AudioChunker,
    inactivity_timeout: Duration,
    cancel: CancellationToken,
) -> IngestOutcome {
    let mut last_frame: Option<Instant> = None;
    let mut frames = 0;

    let end = loop {
        let idle = async {
            match last_frame {
                Some(at) => sleep_until(at + inactivity_timeout).await,
                None => std::future::pending().await,
            }
        };

        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            _ = idle => {
                info!(session_id = %session_id, "No audio received within inactivity timeout");
                break Some(SessionEnd::InactivityTimeout);
            }
            frame = inbound.next() => frame,
        };

        match frame {
            Some(ClientFrame::Audio(data)) => {
                last_frame = Some(Instant::now());
                frames += 1;
                match forward_chunks(&sink, chunker.append(&data), &cancel).await {
                    Ok(true) => {}
                    Ok(false) => break None,
                    Err(e) => break Some(SessionEnd::Failed(e)),
                }
            }
            Some(ClientFrame::Text(text)) => match IncomingControl::parse(&text) {
                Some(IncomingControl::EndOfAudio) => {
                    info!(session_id = %session_id, "Client signalled end of audio");
                    break Some(SessionEnd::EndOfAudio);
                }
                None => debug!(session_id = %session_id, "Ignoring unrecognized text frame"),
            },
            Some(ClientFrame::Close) | None => {
                info!(session_id = %session_id, "Client disconnected");
                break Some(SessionEnd::ClientDisconnect);
            }
        }
    };

    IngestOutcome {
        end,
        chunker,
        frames,
    }
}

/// Send chunks in order. Returns `Ok(false)` if cancelled part way.
async fn forward_chunks(
    sink: &Mutex<ChunkSink>,
    chunks: Vec<Bytes>,
    cancel: &CancellationToken,
) -> Result<bool, SessionError> {
    for chunk in chunks {
        let mut sink = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            sink = sink.lock() => sink,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            result = sink.send_chunk(chunk) => result.map_err(SessionError::UpstreamSend)?,
        }
    }
    Ok(true)
}

/// Event task: engine events in, client text out.
async fn run_events(
    session_id: String,
    mut events: TranscriptStream,
    aggregator: Arc<SyncMutex<TranscriptAggregator>>,
    outbound: mpsc::Sender<MessageRoute>,
) -> SessionEnd {
    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                error!(session_id = %session_id, "Upstream stream error: {}", e);
                return SessionEnd::Failed(SessionError::UpstreamStream(e));
            }
        };

        let text = aggregator.lock().on_event(event);
        if outbound.send(MessageRoute::Transcript(text)).await.is_err() {
            debug!(session_id = %session_id, "Client writer closed, stopping event relay");
            return SessionEnd::ClientDisconnect;
        }
    }

    info!(session_id = %session_id, "Upstream event stream ended");
    SessionEnd::UpstreamClosed
}
