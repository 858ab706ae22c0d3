//! REST API Tests
//!
//! Health check, session listing, instance credentials and S3 upload,
//! with the metadata service and S3 replaced by wiremock servers.

mod mock_engine;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::util::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mock_engine::{MockEngine, StaticCredentialProvider};
use transcribe_relay::auth::ImdsCredentialProvider;
use transcribe_relay::core::session::{SessionEntry, SessionState, StateHandle};
use transcribe_relay::core::stt::AwsRegion;
use transcribe_relay::routes::app::RATE_LIMIT_DISABLED_AT;
use transcribe_relay::{ServerConfig, handlers, routes, state::AppState};

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", axum::routing::get(handlers::health_check))
        .merge(routes::api::create_api_router(&state.config))
        .with_state(state)
}

fn static_state(config: ServerConfig) -> (Arc<AppState>, Arc<StaticCredentialProvider>) {
    let provider = Arc::new(StaticCredentialProvider::new());
    let state = AppState::with_components(config, Arc::new(MockEngine::new()), provider.clone());
    (state, provider)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_health_check() {
    let (state, _) = static_state(ServerConfig::default());

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["engine"], "Mock Engine");
    assert_eq!(body["active_sessions"], 0);
}

#[tokio::test]
async fn test_list_sessions() {
    let (state, _) = static_state(ServerConfig::default());
    state
        .sessions
        .insert(SessionEntry::new(
            "b-client",
            StateHandle::new(SessionState::Streaming),
            None,
        ))
        .unwrap();
    state
        .sessions
        .insert(SessionEntry::new(
            "a-client",
            StateHandle::new(SessionState::Draining),
            Some("10.0.0.7".parse().unwrap()),
        ))
        .unwrap();

    let request = Request::builder()
        .uri("/api/sessions")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 2);

    let sessions = body["sessions"].as_array().unwrap();
    let find = |id: &str| sessions.iter().find(|s| s["id"] == id).unwrap().clone();

    let a = find("a-client");
    assert_eq!(a["state"], "draining");
    assert_eq!(a["client_ip"], "10.0.0.7");
    assert!(a["created_at"].is_string());

    let b = find("b-client");
    assert_eq!(b["state"], "streaming");
    assert!(b["client_ip"].is_null());
}

#[tokio::test]
async fn test_credentials_from_metadata_service() {
    let imds = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tok"))
        .mount(&imds)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/iam/security-credentials/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("relay-role"))
        .mount(&imds)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/iam/security-credentials/relay-role"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AccessKeyId": "ASIAINSTANCE",
            "SecretAccessKey": "instance-secret",
            "Token": "instance-session-token",
            "Expiration": "2099-01-01T00:00:00Z"
        })))
        .mount(&imds)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/placement/region"))
        .respond_with(ResponseTemplate::new(200).set_body_string("us-east-1"))
        .mount(&imds)
        .await;

    let provider = Arc::new(ImdsCredentialProvider::new(
        format!("{}/latest", imds.uri()),
        AwsRegion::UsWest2,
    ));
    let state = AppState::with_components(
        ServerConfig::default(),
        Arc::new(MockEngine::new()),
        provider,
    );

    let request = Request::builder()
        .uri("/api/credentials")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["role"], "relay-role");
    assert_eq!(body["region"], "us-east-1");
    assert_eq!(body["accessKeyId"], "ASIAINSTANCE");
    assert_eq!(body["secretAccessKey"], "instance-secret");
    assert_eq!(body["sessionToken"], "instance-session-token");
    assert_eq!(body["expiration"], "2099-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_credentials_unavailable() {
    let imds = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tok"))
        .mount(&imds)
        .await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/iam/security-credentials/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&imds)
        .await;

    let provider = Arc::new(ImdsCredentialProvider::new(
        format!("{}/latest", imds.uri()),
        AwsRegion::UsWest2,
    ));
    let state = AppState::with_components(
        ServerConfig::default(),
        Arc::new(MockEngine::new()),
        provider,
    );

    let request = Request::builder()
        .uri("/api/credentials")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No IAM role found");
}

#[tokio::test]
async fn test_upload_to_s3() {
    let s3 = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/recordings/calls/today.wav"))
        .and(header("content-type", "audio/wav"))
        .and(header("x-amz-security-token", "instance-token"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"0123abcd\""))
        .expect(1)
        .mount(&s3)
        .await;

    let config = ServerConfig {
        s3_endpoint: Some(s3.uri()),
        ..Default::default()
    };
    let (state, _) = static_state(config);
    let base_url = serve(app(state)).await;

    let form = reqwest::multipart::Form::new()
        .text("s3_path", "s3://recordings/calls/today.wav")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"RIFF....WAVEfmt ".to_vec())
                .file_name("today.wav")
                .mime_str("audio/wav")
                .unwrap(),
        );

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "File uploaded successfully");
    assert_eq!(body["s3_url"], "s3://recordings/calls/today.wav");
}

#[tokio::test]
async fn test_upload_rejects_invalid_path_before_fetching_credentials() {
    let (state, provider) = static_state(ServerConfig::default());
    let base_url = serve(app(state)).await;

    let form = reqwest::multipart::Form::new()
        .text("s3_path", "https://recordings/calls/today.wav")
        .part("file", reqwest::multipart::Part::bytes(vec![1, 2, 3]));

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("s3://"));
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_requires_file_field() {
    let (state, _) = static_state(ServerConfig::default());
    let base_url = serve(app(state)).await;

    let form = reqwest::multipart::Form::new().text("s3_path", "s3://recordings/a.wav");

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Bad request: Missing 'file' field");
}

fn audio_form(s3_path: &str, len: usize) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new().text("s3_path", s3_path.to_string()).part(
        "file",
        reqwest::multipart::Part::bytes(vec![0x55u8; len])
            .file_name("long.wav")
            .mime_str("audio/wav")
            .unwrap(),
    )
}

#[tokio::test]
async fn test_upload_larger_than_axum_default_limit() {
    const THREE_MIB: usize = 3 * 1024 * 1024;

    let s3 = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/recordings/long.wav"))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"feedbeef\""))
        .expect(1)
        .mount(&s3)
        .await;

    let config = ServerConfig {
        s3_endpoint: Some(s3.uri()),
        rate_limit_requests_per_second: RATE_LIMIT_DISABLED_AT,
        ..Default::default()
    };
    let (state, _) = static_state(config);
    let base_url = serve(routes::create_app_router(state).unwrap()).await;

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/upload"))
        .multipart(audio_form("s3://recordings/long.wav", THREE_MIB))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["s3_url"], "s3://recordings/long.wav");

    let received = s3.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].body.len(), THREE_MIB);
}

#[tokio::test]
async fn test_upload_over_configured_limit_rejected() {
    let s3 = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&s3)
        .await;

    let config = ServerConfig {
        s3_endpoint: Some(s3.uri()),
        upload_max_bytes: 1024,
        ..Default::default()
    };
    let (state, provider) = static_state(config);
    let base_url = serve(app(state)).await;

    let response = reqwest::Client::new()
        .post(format!("{base_url}/api/upload"))
        .multipart(audio_form("s3://recordings/long.wav", 8 * 1024))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 413);
    let body: Value = response.json().await.unwrap();
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .starts_with("Payload too large")
    );
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
}
