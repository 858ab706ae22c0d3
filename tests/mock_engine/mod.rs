//! In-process streaming engine for relay tests.
//!
//! Records every chunk written to the sink and the end-of-stream marker.
//! The event stream yields the scripted events, then stays open until the
//! sink is ended, the way a real engine flushes after end of audio. An
//! engine built with `closing_early` hangs up right after its script.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::Notify;

use transcribe_relay::auth::{
    CredentialError, CredentialHandle, InstanceCredentialProvider, InstanceCredentials,
};
use transcribe_relay::core::stt::{
    ChunkSink, STTError, STTResult, StreamConfig, StreamingEngine, TranscriptEvent, UpstreamStream,
};

/// What the engine saw on its input side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkRecord {
    Chunk(Bytes),
    End,
}

#[derive(Default)]
pub struct MockEngine {
    events: Vec<STTResult<TranscriptEvent>>,
    start_error: Option<STTError>,
    starts: AtomicUsize,
    records: Arc<Mutex<Vec<SinkRecord>>>,
    /// Keep the event stream open this long after the sink ends.
    close_delay: Duration,
    /// End the event stream after the scripted events, ignoring the sink.
    close_early: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<STTResult<TranscriptEvent>>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn failing_start(error: STTError) -> Self {
        Self {
            start_error: Some(error),
            ..Self::default()
        }
    }

    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Engine that hangs up once its scripted events are out.
    pub fn closing_early(mut self) -> Self {
        self.close_early = true;
        self
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<SinkRecord> {
        self.records.lock().clone()
    }

    /// Chunk sizes, ignoring the end marker.
    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.records
            .lock()
            .iter()
            .filter_map(|record| match record {
                SinkRecord::Chunk(chunk) => Some(chunk.len()),
                SinkRecord::End => None,
            })
            .collect()
    }
}

#[async_trait]
impl StreamingEngine for MockEngine {
    async fn start_stream(
        &self,
        _credentials: &CredentialHandle,
        _config: &StreamConfig,
    ) -> STTResult<UpstreamStream> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.start_error {
            return Err(error.clone());
        }

        let (sink, mut audio_rx) = ChunkSink::channel(16);
        let records = self.records.clone();
        let audio_done = Arc::new(Notify::new());

        let done = audio_done.clone();
        tokio::spawn(async move {
            while let Some(chunk) = audio_rx.recv().await {
                records.lock().push(SinkRecord::Chunk(chunk));
            }
            records.lock().push(SinkRecord::End);
            done.notify_one();
        });

        let scripted = self.events.clone();
        let close_delay = self.close_delay;
        let close_early = self.close_early;
        let events = async_stream::stream! {
            for event in scripted {
                let failed = event.is_err();
                yield event;
                if failed {
                    return;
                }
            }
            if close_early {
                return;
            }
            audio_done.notified().await;
            tokio::time::sleep(close_delay).await;
        };

        Ok(UpstreamStream {
            sink,
            events: Box::pin(events),
        })
    }

    fn provider_info(&self) -> &'static str {
        "Mock Engine"
    }
}

/// Instance credential provider returning fixed credentials.
pub struct StaticCredentialProvider {
    pub fetches: AtomicUsize,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self {
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl InstanceCredentialProvider for StaticCredentialProvider {
    async fn fetch(&self) -> Result<InstanceCredentials, CredentialError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(InstanceCredentials {
            role: "relay-role".to_string(),
            region: "us-west-2".to_string(),
            access_key_id: "ASIAEXAMPLE".to_string(),
            secret_access_key: "instance-secret".to_string(),
            session_token: "instance-token".to_string(),
            expiration: OffsetDateTime::now_utc() + time::Duration::hours(6),
        })
    }
}

/// Credential message accepted by the gate.
pub const VALID_CREDENTIALS: &str =
    r#"{"access_key":"AKIDEXAMPLE","secret_key":"wJalrXUtnFEMI","region":"us-west-2"}"#;

pub fn partial(text: &str) -> STTResult<TranscriptEvent> {
    Ok(TranscriptEvent::Partial(text.to_string()))
}

pub fn final_event(text: &str) -> STTResult<TranscriptEvent> {
    Ok(TranscriptEvent::Final(text.to_string()))
}
