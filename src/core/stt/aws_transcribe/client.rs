//! Amazon Transcribe Streaming engine implementation.
//!
//! `AwsTranscribeEngine` implements [`StreamingEngine`] on top of the AWS SDK
//! for Rust. Each call to `start_stream` opens one bidirectional HTTP/2
//! stream with the caller's credentials:
//!
//! - audio chunks written to the returned [`ChunkSink`] are wrapped in
//!   `AudioEvent`s and streamed to Transcribe
//! - `end_stream` on the sink ends the audio stream, after which Transcribe
//!   flushes its remaining results and closes the result stream
//! - transcript results are surfaced as [`TranscriptEvent`]s
//!
//! # Audio Format Requirements
//!
//! - PCM: 16-bit signed little-endian, mono
//! - Sample rate: 8,000 Hz to 48,000 Hz (16,000 Hz recommended)

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_transcribestreaming::Client as TranscribeClient;
use aws_sdk_transcribestreaming::types::error::AudioStreamError;
use aws_sdk_transcribestreaming::types::{
    AudioEvent, AudioStream, LanguageCode, MediaEncoding as AwsMediaEncoding,
    PartialResultsStability as AwsPartialResultsStability, TranscriptResultStream,
};
use aws_smithy_types::Blob;
use tracing::{debug, error, info, warn};

use super::config::{
    AwsTranscribeConfig, MediaEncoding, PartialResultsStability, validate_stream_config,
};
use super::messages::events_from_transcript;
use crate::auth::CredentialHandle;
use crate::core::stt::base::{
    ChunkSink, STTError, STTResult, StreamConfig, StreamingEngine, UpstreamStream,
};

/// Channel buffer size for audio data.
const AUDIO_CHANNEL_BUFFER_SIZE: usize = 32;

/// Provider name reported to credential providers.
const CREDENTIALS_PROVIDER_NAME: &str = "transcribe-relay";

/// Amazon Transcribe Streaming engine.
#[derive(Debug, Clone, Default)]
pub struct AwsTranscribeEngine {
    config: AwsTranscribeConfig,
}

impl AwsTranscribeEngine {
    pub fn new(config: AwsTranscribeConfig) -> Self {
        Self { config }
    }

    /// Convert relay MediaEncoding to AWS SDK MediaEncoding.
    fn convert_media_encoding(encoding: &MediaEncoding) -> AwsMediaEncoding {
        match encoding {
            MediaEncoding::Pcm => AwsMediaEncoding::Pcm,
            MediaEncoding::Flac => AwsMediaEncoding::Flac,
            MediaEncoding::OggOpus => AwsMediaEncoding::OggOpus,
        }
    }

    fn convert_partial_results_stability(
        stability: &PartialResultsStability,
    ) -> AwsPartialResultsStability {
        match stability {
            PartialResultsStability::High => AwsPartialResultsStability::High,
            PartialResultsStability::Medium => AwsPartialResultsStability::Medium,
            PartialResultsStability::Low => AwsPartialResultsStability::Low,
        }
    }

    /// Convert language code string to AWS SDK LanguageCode.
    fn convert_language_code(language: &str) -> LanguageCode {
        match language.to_lowercase().as_str() {
            "en-us" | "en_us" => LanguageCode::EnUs,
            "en-gb" | "en_gb" => LanguageCode::EnGb,
            "en-au" | "en_au" => LanguageCode::EnAu,
            "es-us" | "es_us" => LanguageCode::EsUs,
            "es-es" | "es_es" => LanguageCode::EsEs,
            "fr-fr" | "fr_fr" => LanguageCode::FrFr,
            "fr-ca" | "fr_ca" => LanguageCode::FrCa,
            "de-de" | "de_de" => LanguageCode::DeDe,
            "it-it" | "it_it" => LanguageCode::ItIt,
            "pt-br" | "pt_br" => LanguageCode::PtBr,
            "ja-jp" | "ja_jp" => LanguageCode::JaJp,
            "ko-kr" | "ko_kr" => LanguageCode::KoKr,
            "zh-cn" | "zh_cn" => LanguageCode::ZhCn,
            "hi-in" | "hi_in" => LanguageCode::HiIn,
            _ => {
                warn!(
                    "Unsupported language code '{}', defaulting to en-US",
                    language
                );
                LanguageCode::EnUs
            }
        }
    }

    /// Build a Transcribe client bound to the session's credentials and region.
    async fn build_client(credentials: &CredentialHandle) -> TranscribeClient {
        let aws_credentials = aws_credential_types::Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token().map(str::to_string),
            None, // Expiration
            CREDENTIALS_PROVIDER_NAME,
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(credentials.region().as_str()))
            .credentials_provider(aws_credentials)
            .load()
            .await;

        TranscribeClient::new(&aws_config)
    }
}

#[async_trait]
impl StreamingEngine for AwsTranscribeEngine {
    async fn start_stream(
        &self,
        credentials: &CredentialHandle,
        config: &StreamConfig,
    ) -> STTResult<UpstreamStream> {
        validate_stream_config(config).map_err(STTError::ConfigurationError)?;

        let client = Self::build_client(credentials).await;
        let (sink, mut audio_rx) = ChunkSink::channel(AUDIO_CHANNEL_BUFFER_SIZE);

        // The audio stream ends when the sink is ended or dropped
        let audio_stream = async_stream::stream! {
            while let Some(chunk) = audio_rx.recv().await {
                // AWS SDK Blob requires Vec<u8>, so a copy is unavoidable here.
                let audio_event = AudioEvent::builder()
                    .audio_chunk(Blob::new(chunk.to_vec()))
                    .build();
                yield Ok::<_, AudioStreamError>(AudioStream::AudioEvent(audio_event));
            }
            debug!("Audio input ended, closing Transcribe audio stream");
        };

        let mut request = client
            .start_stream_transcription()
            .language_code(Self::convert_language_code(&config.language_code))
            .media_sample_rate_hertz(config.sample_rate_hz as i32)
            .media_encoding(Self::convert_media_encoding(&config.encoding));

        if self.config.enable_partial_results_stabilization {
            request = request
                .enable_partial_results_stabilization(true)
                .partial_results_stability(Self::convert_partial_results_stability(
                    &self.config.partial_results_stability,
                ));
        }

        let timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let output = match tokio::time::timeout(
            timeout,
            request.audio_stream(audio_stream.into()).send(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let stt_error = STTError::ConnectionFailed(format!(
                    "Failed to start Amazon Transcribe stream: {}",
                    e
                ));
                error!("{}", stt_error);
                return Err(stt_error);
            }
            Err(_) => {
                return Err(STTError::ConnectionFailed(
                    "Connection timeout".to_string(),
                ));
            }
        };

        if let Some(sid) = output.session_id() {
            info!("Amazon Transcribe session started: {}", sid);
        }

        let mut result_stream = output.transcript_result_stream;
        let events = async_stream::stream! {
            loop {
                match result_stream.recv().await {
                    Ok(Some(TranscriptResultStream::TranscriptEvent(transcript_event))) => {
                        if let Some(transcript) = transcript_event.transcript {
                            for event in events_from_transcript(transcript) {
                                yield Ok(event);
                            }
                        }
                    }
                    Ok(Some(_)) => {
                        debug!("Received unknown event type from Transcribe");
                    }
                    Ok(None) => {
                        info!("Transcribe stream ended");
                        break;
                    }
                    Err(e) => {
                        let stt_error = STTError::ProviderError(format!(
                            "Amazon Transcribe stream error: {}",
                            e
                        ));
                        error!("{}", stt_error);
                        yield Err(stt_error);
                        break;
                    }
                }
            }
        };

        Ok(UpstreamStream {
            sink,
            events: Box::pin(events),
        })
    }

    fn provider_info(&self) -> &'static str {
        "Amazon Transcribe Streaming"
    }
}
