//! Instance Metadata Credential Tests
//!
//! Exercises the IMDSv2 flow against a wiremock metadata service.

use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use transcribe_relay::auth::{
    CredentialCache, CredentialError, ImdsCredentialProvider, InstanceCredentialProvider,
};
use transcribe_relay::core::stt::AwsRegion;

const TOKEN: &str = "imds-session-token";

fn credential_document(expiration: &str) -> serde_json::Value {
    json!({
        "Code": "Success",
        "LastUpdated": "2024-05-01T10:00:00Z",
        "Type": "AWS-HMAC",
        "AccessKeyId": "ASIAINSTANCE",
        "SecretAccessKey": "instance-secret",
        "Token": "instance-session-token",
        "Expiration": expiration
    })
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .and(header("X-aws-ec2-metadata-token-ttl-seconds", "21600"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN))
        .mount(server)
        .await;
}

async fn mount_role(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/iam/security-credentials/"))
        .and(header("X-aws-ec2-metadata-token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_credentials(server: &MockServer, expiration: &str) {
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/iam/security-credentials/relay-role"))
        .and(header("X-aws-ec2-metadata-token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(credential_document(expiration)))
        .mount(server)
        .await;
}

fn provider(server: &MockServer) -> ImdsCredentialProvider {
    ImdsCredentialProvider::new(format!("{}/latest", server.uri()), AwsRegion::UsWest2)
}

#[tokio::test]
async fn test_fetch_instance_credentials() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_role(&server, "relay-role\n").await;
    mount_credentials(&server, "2024-05-01T16:00:00Z").await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/placement/region"))
        .respond_with(ResponseTemplate::new(200).set_body_string("eu-west-1"))
        .mount(&server)
        .await;

    let credentials = provider(&server).fetch().await.unwrap();

    assert_eq!(credentials.role, "relay-role");
    assert_eq!(credentials.region, "eu-west-1");
    assert_eq!(credentials.access_key_id, "ASIAINSTANCE");
    assert_eq!(credentials.secret_access_key, "instance-secret");
    assert_eq!(credentials.session_token, "instance-session-token");
    assert_eq!(credentials.expiration, datetime!(2024-05-01 16:00:00 UTC));
}

#[tokio::test]
async fn test_region_falls_back_to_default() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_role(&server, "relay-role").await;
    mount_credentials(&server, "2024-05-01T16:00:00Z").await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/placement/region"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let credentials = provider(&server).fetch().await.unwrap();
    assert_eq!(credentials.region, "us-west-2");
}

#[tokio::test]
async fn test_no_role_attached() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_role(&server, "\n").await;

    let result = provider(&server).fetch().await;
    assert_eq!(result.unwrap_err(), CredentialError::NoRole);
}

#[tokio::test]
async fn test_token_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = provider(&server).fetch().await;
    assert!(matches!(result, Err(CredentialError::Token(_))));
}

#[tokio::test]
async fn test_malformed_credential_document() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_role(&server, "relay-role").await;
    Mock::given(method("GET"))
        .and(path("/latest/meta-data/iam/security-credentials/relay-role"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"Code\":\"Failure\"}"))
        .mount(&server)
        .await;

    let result = provider(&server).fetch().await;
    assert!(matches!(result, Err(CredentialError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_cache_serves_fresh_credentials_without_refetching() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN))
        .expect(1)
        .mount(&server)
        .await;
    mount_role(&server, "relay-role").await;

    let expiration = (OffsetDateTime::now_utc() + time::Duration::hours(6))
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap();
    mount_credentials(&server, &expiration).await;

    let cache = CredentialCache::new(Arc::new(provider(&server)));

    let first = cache.get().await.unwrap();
    let second = cache.get().await.unwrap();
    assert_eq!(first, second);
    // MockServer verifies the single token request on drop
}

#[tokio::test]
async fn test_cache_refetches_expired_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/latest/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN))
        .expect(2)
        .mount(&server)
        .await;
    mount_role(&server, "relay-role").await;
    mount_credentials(&server, "2020-01-01T00:00:00Z").await;

    let cache = CredentialCache::new(Arc::new(provider(&server)));

    cache.get().await.unwrap();
    cache.get().await.unwrap();
}
