//! Conversion from Amazon Transcribe result payloads to relay events.
//!
//! A `TranscriptEvent` from Transcribe may carry several results. Each result
//! with a non-blank best alternative becomes one [`TranscriptEvent`]; results
//! flagged `is_partial` become partials, everything else is final.

use aws_sdk_transcribestreaming::types::Transcript;

use crate::core::stt::base::TranscriptEvent;

/// Flatten a Transcribe transcript into relay events, preserving result order.
pub fn events_from_transcript(transcript: Transcript) -> Vec<TranscriptEvent> {
    transcript
        .results
        .unwrap_or_default()
        .into_iter()
        .filter_map(|result| {
            // Only the best alternative is relayed
            let text = result
                .alternatives
                .and_then(|alternatives| alternatives.into_iter().next())
                .and_then(|alternative| alternative.transcript)?;

            if text.trim().is_empty() {
                return None;
            }

            Some(if result.is_partial {
                TranscriptEvent::Partial(text)
            } else {
                TranscriptEvent::Final(text)
            })
        })
        .collect()
}
