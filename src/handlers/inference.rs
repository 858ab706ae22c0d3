//! Transcription jobs and Bedrock text generation with instance credentials.
//!
//! `POST /api/transcribe` transcribes an S3 audio object and runs the
//! transcript through a model. `POST /api/bedrock` runs a supplied transcript
//! through a model. Both reject a request before fetching credentials when a
//! field is missing or the model is not configured.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::llm::ModelSpec;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub s3_audio_url: Option<String>,
    pub system_prompt: Option<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub transcript: String,
    pub bedrock_claude_result: String,
}

#[derive(Debug, Deserialize)]
pub struct InferenceRequest {
    pub transcript: Option<String>,
    pub system_prompt: Option<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InferenceResponse {
    pub bedrock_result: String,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

fn missing_fields() -> AppError {
    AppError::BadRequest("Missing required fields".to_string())
}

fn lookup_model<'a>(state: &'a AppState, name: &str) -> AppResult<&'a ModelSpec> {
    state
        .config
        .models
        .get(name)
        .ok_or_else(|| AppError::BadRequest(format!("Unsupported model: {name}")))
}

/// Transcribe `s3_audio_url` with a transcription job, then run the
/// transcript through `model_name` under `system_prompt`.
pub async fn transcribe_audio(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranscribeRequest>,
) -> AppResult<Json<TranscribeResponse>> {
    let (Some(audio_url), Some(system_prompt), Some(model_name)) = (
        present(&request.s3_audio_url),
        present(&request.system_prompt),
        present(&request.model_name),
    ) else {
        return Err(missing_fields());
    };
    let model = lookup_model(&state, model_name)?;
    info!(s3_audio_url = %audio_url, model = %model_name, "Received transcribe request");

    let credentials = state.instance_credentials.get().await?;
    let transcript = state.transcriber.transcribe(&credentials, audio_url).await?;
    let result = state
        .generator
        .generate(&credentials, model, system_prompt, &transcript)
        .await?;

    Ok(Json(TranscribeResponse {
        transcript,
        bedrock_claude_result: result,
    }))
}

/// Run `transcript` through `model_name` under `system_prompt`.
pub async fn bedrock_inference(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InferenceRequest>,
) -> AppResult<Json<InferenceResponse>> {
    let (Some(transcript), Some(system_prompt), Some(model_name)) = (
        present(&request.transcript),
        present(&request.system_prompt),
        present(&request.model_name),
    ) else {
        return Err(missing_fields());
    };
    let model = lookup_model(&state, model_name)?;
    info!(model = %model_name, "Received Bedrock inference request");

    let credentials = state.instance_credentials.get().await?;
    let result = state
        .generator
        .generate(&credentials, model, system_prompt, transcript)
        .await?;

    Ok(Json(InferenceResponse {
        bedrock_result: result,
    }))
}
