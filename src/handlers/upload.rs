//! File upload to S3 using the instance role's temporary credentials.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::{
    Attribute, Attributes, ObjectStore, PutOptions, PutPayload, path::Path as ObjectPath,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::auth::InstanceCredentials;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub s3_url: String,
}

/// Destination parsed from an `s3://bucket/key` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    pub fn url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Parse `s3://bucket/key`. Leading slashes on the key are dropped.
pub fn parse_s3_path(raw: &str) -> AppResult<S3Location> {
    let rest = raw
        .trim()
        .strip_prefix("s3://")
        .ok_or_else(|| AppError::BadRequest("Invalid S3 path. Must start with 's3://'".into()))?;

    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    let key = key.trim_start_matches('/');

    if bucket.is_empty() || key.is_empty() {
        return Err(AppError::BadRequest("Invalid S3 path format".into()));
    }

    Ok(S3Location {
        bucket: bucket.to_string(),
        key: key.to_string(),
    })
}

struct UploadForm {
    file_name: Option<String>,
    content_type: String,
    data: Bytes,
    s3_path: String,
}

/// 413 when the body went over the upload limit, 400 otherwise.
fn form_error(context: &str, error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(error.body_text())
    } else {
        AppError::BadRequest(format!("{context}: {error}"))
    }
}

async fn read_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut file = None;
    let mut s3_path = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| form_error("Malformed multipart body", e))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field
                    .content_type()
                    .unwrap_or(DEFAULT_CONTENT_TYPE)
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| form_error("Failed to read file", e))?;
                file = Some((file_name, content_type, data));
            }
            Some("s3_path") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| form_error("Failed to read s3_path", e))?;
                s3_path = Some(text);
            }
            other => debug!(field = ?other, "Ignoring unknown multipart field"),
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::BadRequest("Missing 'file' field".into()))?;
    let s3_path = s3_path.ok_or_else(|| AppError::BadRequest("Missing 's3_path' field".into()))?;

    Ok(UploadForm {
        file_name,
        content_type,
        data,
        s3_path,
    })
}

fn build_store(
    location: &S3Location,
    credentials: &InstanceCredentials,
    endpoint: Option<&str>,
) -> AppResult<impl ObjectStore> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&location.bucket)
        .with_region(&credentials.region)
        .with_access_key_id(&credentials.access_key_id)
        .with_secret_access_key(&credentials.secret_access_key)
        .with_token(&credentials.session_token);

    if let Some(endpoint) = endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(endpoint.starts_with("http://"));
    }

    Ok(builder.build()?)
}

/// Upload the `file` field of a multipart form to the `s3_path` field's location.
pub async fn upload_to_s3(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let form = read_form(multipart).await?;
    info!(
        file_name = ?form.file_name,
        s3_path = %form.s3_path,
        size = form.data.len(),
        "Received file upload request"
    );

    let location = parse_s3_path(&form.s3_path)?;
    let object_path = ObjectPath::parse(&location.key)
        .map_err(|e| AppError::BadRequest(format!("Invalid object key: {e}")))?;

    let credentials = state.instance_credentials.get().await?;
    let store = build_store(&location, &credentials, state.config.s3_endpoint.as_deref())?;

    let mut attributes = Attributes::new();
    attributes.insert(Attribute::ContentType, form.content_type.into());
    let options = PutOptions {
        attributes,
        ..Default::default()
    };

    store
        .put_opts(&object_path, PutPayload::from(form.data), options)
        .await?;

    let s3_url = location.url();
    info!(s3_url = %s3_url, "Uploaded file to S3");

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        s3_url,
    }))
}
