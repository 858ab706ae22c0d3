//! Silence injection that keeps the upstream stream from idling out.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::state::{SessionState, StateHandle};
use crate::core::stt::ChunkSink;

/// Default interval between silence chunks.
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Periodically writes a zero-filled chunk to the upstream sink.
pub struct KeepAlive {
    session_id: String,
    sink: Arc<Mutex<ChunkSink>>,
    state: StateHandle,
    interval: Duration,
    silence: Bytes,
}

impl KeepAlive {
    pub fn new(
        session_id: impl Into<String>,
        sink: Arc<Mutex<ChunkSink>>,
        state: StateHandle,
        interval: Duration,
        chunk_size: usize,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            sink,
            state,
            interval,
            silence: Bytes::from(vec![0u8; chunk_size]),
        }
    }

    /// Run until cancelled, the session leaves STREAMING, or a send fails.
    /// Returns the number of silence chunks sent.
    pub async fn run(self, cancel: CancellationToken) -> usize {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sent = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let mut sink = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sink = self.sink.lock() => sink,
            };

            // Re-checked under the lock: draining sets the state before cancelling
            if cancel.is_cancelled() || self.state.get() != SessionState::Streaming {
                break;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = sink.send_chunk(self.silence.clone()) => result,
            };

            match result {
                Ok(()) => {
                    sent += 1;
                    debug!(session_id = %self.session_id, "Sent keep-alive silence");
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, "Keep-alive send failed: {}", e);
                    break;
                }
            }
        }

        debug!(session_id = %self.session_id, sent, "Keep-alive stopped");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn keep_alive(
        state: StateHandle,
        chunk_size: usize,
    ) -> (KeepAlive, mpsc::Receiver<Bytes>, Arc<Mutex<ChunkSink>>) {
        let (sink, rx) = ChunkSink::channel(16);
        let sink = Arc::new(Mutex::new(sink));
        let task = KeepAlive::new(
            "test",
            sink.clone(),
            state,
            Duration::from_secs(5),
            chunk_size,
        );
        (task, rx, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_send_after_one_interval() {
        let state = StateHandle::new(SessionState::Streaming);
        let (task, mut rx, _sink) = keep_alive(state, 4096);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(task.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk.len(), 4096);
        assert!(chunk.iter().all(|b| *b == 0));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.recv().await.unwrap().len(), 4096);

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sends_once_draining() {
        let state = StateHandle::new(SessionState::Streaming);
        let (task, mut rx, _sink) = keep_alive(state.clone(), 64);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(task.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert!(rx.recv().await.is_some());

        state.set(SessionState::Draining);
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(handle.await.unwrap(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_immediately() {
        let state = StateHandle::new(SessionState::Streaming);
        let (task, mut rx, _sink) = keep_alive(state, 64);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(task.run(cancel.clone()));

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_ends_task() {
        let state = StateHandle::new(SessionState::Streaming);
        let (task, rx, _sink) = keep_alive(state, 64);
        drop(rx);

        let sent = task.run(CancellationToken::new()).await;
        assert_eq!(sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_sink_ends_task() {
        let state = StateHandle::new(SessionState::Streaming);
        let (task, _rx, sink) = keep_alive(state, 64);
        sink.lock().await.end_stream();

        let sent = task.run(CancellationToken::new()).await;
        assert_eq!(sent, 0);
    }
}
