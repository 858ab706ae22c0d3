//! One-shot transcription of a stored audio file.
//!
//! `AwsBatchTranscriber` runs an Amazon Transcribe job against an S3 object:
//! start the job, poll until it completes or fails, download the transcript
//! document, then delete the job. The job is deleted whatever the outcome;
//! a failed delete is only logged.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_transcribe::Client as TranscribeJobClient;
use aws_sdk_transcribe::error::DisplayErrorContext;
use aws_sdk_transcribe::types::{LanguageCode, Media, MediaFormat, TranscriptionJobStatus};
use serde::Deserialize;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::InstanceCredentials;

/// Prefix of generated job names.
pub const JOB_NAME_PREFIX: &str = "transcribe-job-";
pub const DEFAULT_JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BatchError {
    #[error("Failed to start transcription job: {0}")]
    Start(String),

    #[error("Failed to read transcription job status: {0}")]
    Status(String),

    #[error("Transcription job failed: {0}")]
    JobFailed(String),

    #[error("Transcription job did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Completed job has no transcript location")]
    MissingTranscript,

    #[error("Failed to retrieve transcription result: {0}")]
    Fetch(String),

    #[error("Invalid transcription result format: {0}")]
    InvalidTranscript(String),
}

/// A backend that turns a stored audio file into text.
#[async_trait]
pub trait BatchTranscriber: Send + Sync {
    async fn transcribe(
        &self,
        credentials: &InstanceCredentials,
        media_uri: &str,
    ) -> Result<String, BatchError>;
}

/// Transcript document written by a finished job.
#[derive(Debug, Deserialize)]
struct TranscriptDocument {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    transcripts: Vec<TranscriptText>,
}

#[derive(Debug, Deserialize)]
struct TranscriptText {
    transcript: String,
}

/// Formats a transcription job accepts.
const MEDIA_FORMATS: [&str; 8] = ["amr", "flac", "m4a", "mp3", "mp4", "ogg", "wav", "webm"];

/// Media format from the object's extension. Unknown extensions are sent as mp3.
pub fn media_format_for(media_uri: &str) -> MediaFormat {
    let path = media_uri.split(['?', '#']).next().unwrap_or(media_uri);
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let format = match extension.as_str() {
        "opus" => "ogg",
        ext if MEDIA_FORMATS.contains(&ext) => ext,
        _ => "mp3",
    };
    MediaFormat::from(format)
}

fn first_transcript(body: &[u8]) -> Result<String, BatchError> {
    let document: TranscriptDocument = serde_json::from_slice(body)
        .map_err(|e| BatchError::InvalidTranscript(e.to_string()))?;
    document
        .results
        .transcripts
        .into_iter()
        .next()
        .map(|t| t.transcript)
        .ok_or_else(|| BatchError::InvalidTranscript("no transcripts in result".to_string()))
}

#[derive(Debug, Clone)]
pub struct AwsBatchTranscriber {
    endpoint_url: Option<String>,
    language_code: String,
    poll_interval: Duration,
    timeout: Duration,
    http: reqwest::Client,
}

impl AwsBatchTranscriber {
    pub fn new(
        endpoint_url: Option<String>,
        language_code: impl Into<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint_url,
            language_code: language_code.into(),
            poll_interval,
            timeout,
            http: reqwest::Client::new(),
        }
    }

    /// Poll until the job settles. Returns the transcript document URI.
    async fn wait_for_job(
        &self,
        client: &TranscribeJobClient,
        job_name: &str,
    ) -> Result<String, BatchError> {
        loop {
            let output = client
                .get_transcription_job()
                .transcription_job_name(job_name)
                .send()
                .await
                .map_err(|e| BatchError::Status(DisplayErrorContext(&e).to_string()))?;

            let job = output
                .transcription_job()
                .ok_or_else(|| BatchError::Status("response has no job".to_string()))?;

            match job.transcription_job_status() {
                Some(TranscriptionJobStatus::Completed) => {
                    return job
                        .transcript()
                        .and_then(|t| t.transcript_file_uri())
                        .map(str::to_string)
                        .ok_or(BatchError::MissingTranscript);
                }
                Some(TranscriptionJobStatus::Failed) => {
                    let reason = job.failure_reason().unwrap_or("unknown reason");
                    error!(job_name, reason, "Transcription job failed");
                    return Err(BatchError::JobFailed(reason.to_string()));
                }
                status => debug!(job_name, status = ?status, "Transcription job pending"),
            }

            sleep(self.poll_interval).await;
        }
    }

    async fn fetch_transcript(&self, uri: &str) -> Result<String, BatchError> {
        let response = self
            .http
            .get(uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| BatchError::Fetch(e.to_string()))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| BatchError::Fetch(e.to_string()))?;
        first_transcript(&body)
    }

    async fn run_job(
        &self,
        client: &TranscribeJobClient,
        job_name: &str,
    ) -> Result<String, BatchError> {
        let uri = timeout(self.timeout, self.wait_for_job(client, job_name))
            .await
            .map_err(|_| BatchError::Timeout(self.timeout))??;
        self.fetch_transcript(&uri).await
    }
}

#[async_trait]
impl BatchTranscriber for AwsBatchTranscriber {
    async fn transcribe(
        &self,
        credentials: &InstanceCredentials,
        media_uri: &str,
    ) -> Result<String, BatchError> {
        let sdk_config = credentials.sdk_config(self.endpoint_url.as_deref()).await;
        let client = TranscribeJobClient::new(&sdk_config);
        let job_name = format!("{JOB_NAME_PREFIX}{}", Uuid::new_v4());

        client
            .start_transcription_job()
            .transcription_job_name(&job_name)
            .media(Media::builder().media_file_uri(media_uri).build())
            .media_format(media_format_for(media_uri))
            .language_code(LanguageCode::from(self.language_code.as_str()))
            .send()
            .await
            .map_err(|e| BatchError::Start(DisplayErrorContext(&e).to_string()))?;
        info!(job_name = %job_name, media_uri, "Started transcription job");

        let result = self.run_job(&client, &job_name).await;

        if let Err(e) = client
            .delete_transcription_job()
            .transcription_job_name(&job_name)
            .send()
            .await
        {
            warn!(
                job_name = %job_name,
                "Failed to delete transcription job: {}",
                DisplayErrorContext(&e)
            );
        }

        if let Ok(transcript) = &result {
            info!(job_name = %job_name, chars = transcript.len(), "Transcription job completed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_format_from_extension() {
        let format = |uri| media_format_for(uri).as_str().to_string();
        assert_eq!(format("s3://b/calls/a.WAV"), "wav");
        assert_eq!(format("s3://b/a.flac"), "flac");
        assert_eq!(format("s3://b/a.m4a"), "m4a");
        assert_eq!(format("s3://b/a.opus"), "ogg");
        assert_eq!(
            format("https://b.s3.amazonaws.com/a.webm?versionId=1"),
            "webm"
        );
        assert_eq!(format("s3://b/a.mp3"), "mp3");
        assert_eq!(format("s3://b/recording"), "mp3");
        assert_eq!(format("s3://b/notes.txt"), "mp3");
    }

    #[test]
    fn test_first_transcript() {
        let body = br#"{
            "jobName": "transcribe-job-1",
            "results": {
                "transcripts": [{"transcript": "hello world"}],
                "items": []
            },
            "status": "COMPLETED"
        }"#;
        assert_eq!(first_transcript(body).unwrap(), "hello world");
    }

    #[test]
    fn test_transcript_document_without_transcripts() {
        let err = first_transcript(br#"{"results":{"transcripts":[]}}"#).unwrap_err();
        assert!(matches!(err, BatchError::InvalidTranscript(_)));

        let err = first_transcript(b"not json").unwrap_err();
        assert!(matches!(err, BatchError::InvalidTranscript(_)));
    }
}
