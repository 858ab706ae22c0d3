//! Partial/final transcript aggregation.
//!
//! Partials are treated as incremental pieces: each one is relayed as-is and
//! remembered, and a final is relayed as every partial since the previous
//! final followed by the final text. Engines that send cumulative partials
//! therefore see the earlier partial text repeated in the final emission.

use serde::Serialize;
use std::fmt;

use crate::core::stt::TranscriptEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorState {
    Idle,
    Accumulating,
}

impl fmt::Display for AggregatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Accumulating => write!(f, "accumulating"),
        }
    }
}

/// Turns engine events into client text. History is non-empty exactly
/// while the aggregator is accumulating.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    history: Vec<String>,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one event and return the text to send to the client.
    pub fn on_event(&mut self, event: TranscriptEvent) -> String {
        match event {
            TranscriptEvent::Partial(text) => {
                self.history.push(text.clone());
                text
            }
            TranscriptEvent::Final(text) => {
                let mut emitted = self.history.concat();
                emitted.push_str(&text);
                self.history.clear();
                emitted
            }
        }
    }

    pub fn state(&self) -> AggregatorState {
        if self.history.is_empty() {
            AggregatorState::Idle
        } else {
            AggregatorState::Accumulating
        }
    }

    /// Number of partials seen since the last final.
    pub fn pending_partials(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(text: &str) -> TranscriptEvent {
        TranscriptEvent::Partial(text.to_string())
    }

    fn final_event(text: &str) -> TranscriptEvent {
        TranscriptEvent::Final(text.to_string())
    }

    #[test]
    fn test_partials_then_final() {
        let mut aggregator = TranscriptAggregator::new();

        assert_eq!(aggregator.on_event(partial("hi")), "hi");
        assert_eq!(aggregator.state(), AggregatorState::Accumulating);
        assert_eq!(aggregator.on_event(partial("hi there")), "hi there");
        assert_eq!(aggregator.pending_partials(), 2);

        // Cumulative partials are concatenated, not deduplicated
        assert_eq!(aggregator.on_event(final_event("!")), "hihi there!");
        assert_eq!(aggregator.state(), AggregatorState::Idle);
        assert_eq!(aggregator.pending_partials(), 0);
    }

    #[test]
    fn test_final_without_partials() {
        let mut aggregator = TranscriptAggregator::new();
        assert_eq!(aggregator.on_event(final_event("hello.")), "hello.");
        assert_eq!(aggregator.state(), AggregatorState::Idle);
    }

    #[test]
    fn test_history_resets_between_segments() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.on_event(partial("one "));
        assert_eq!(aggregator.on_event(final_event("done")), "one done");

        aggregator.on_event(partial("two "));
        assert_eq!(aggregator.on_event(final_event("again")), "two again");
    }

    #[test]
    fn test_history_invariant_holds_for_any_sequence() {
        let mut aggregator = TranscriptAggregator::new();
        let events = [
            partial("a"),
            final_event("b"),
            final_event("c"),
            partial("d"),
            partial("e"),
            final_event("f"),
            partial("g"),
        ];

        for event in events {
            let is_final = event.is_final();
            aggregator.on_event(event);
            if is_final {
                assert_eq!(aggregator.pending_partials(), 0);
            }
            assert_eq!(
                aggregator.state() == AggregatorState::Accumulating,
                aggregator.pending_partials() > 0
            );
        }
        assert_eq!(aggregator.state(), AggregatorState::Accumulating);
    }
}
