//! Rejections at the HTTP boundary. None of these produce a verdict.

use admission_webhook::WebhookConfig;
use admission_webhook::health::Outcome;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode, header::CONTENT_TYPE};
use serde_json::Value;

use crate::fixtures::ReviewBuilder;
use crate::harness::{Harness, get, post_json};

#[tokio::test]
async fn test_get_on_admission_route_is_405() {
    let harness = Harness::new();
    let (status, _) = harness.send(get("/mutate")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = harness.send(get("/validate")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let (status, _) = Harness::new()
        .send(post_json("/admit", ReviewBuilder::pod("web").to_bytes()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_content_type_is_415() {
    let harness = Harness::new();
    let request = Request::post("/validate")
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from(ReviewBuilder::pod("web").to_bytes()))
        .unwrap();
    let (status, body) = harness.send(request).await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert!(doc["error"].as_str().unwrap().contains("text/plain"));
    assert_eq!(
        harness.health.metrics.request_count("validate", Outcome::Rejected),
        1
    );
}

#[tokio::test]
async fn test_missing_content_type_is_415() {
    let request = Request::post("/mutate")
        .body(Body::from(ReviewBuilder::pod("web").to_bytes()))
        .unwrap();
    let (status, _) = Harness::new().send(request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_content_type_with_charset_accepted() {
    let request = Request::post("/mutate")
        .header(CONTENT_TYPE, "application/json; charset=utf-8")
        .body(Body::from(ReviewBuilder::pod("web").to_bytes()))
        .unwrap();
    let (status, _) = Harness::new().send(request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_empty_body_is_400() {
    let (status, body) = Harness::new().send(post_json("/mutate", Vec::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["error"], "request body is empty");
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let (status, _) = Harness::new()
        .send(post_json("/validate", b"{not json".to_vec()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_truncated_body_is_400() {
    let mut body = ReviewBuilder::pod("web").to_bytes();
    body.truncate(body.len() / 2);
    let (status, _) = Harness::new().send(post_json("/validate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_request_is_400() {
    let body = br#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview"}"#.to_vec();
    let (status, body) = Harness::new().send(post_json("/mutate", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert!(doc["error"].as_str().unwrap().contains("no request"));
}

#[tokio::test]
async fn test_missing_resource_is_400() {
    let mut review = ReviewBuilder::pod("web").build();
    review["request"].as_object_mut().unwrap().remove("resource");
    let (status, _) = Harness::new()
        .send(post_json("/validate", serde_json::to_vec(&review).unwrap()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let harness = Harness::with_config(WebhookConfig {
        max_body_bytes: 64,
        ..WebhookConfig::default()
    });
    let body = ReviewBuilder::pod("web")
        .annotation("padding", "x".repeat(256))
        .to_bytes();
    let (status, _) = harness.send(post_json("/validate", body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_body_is_408() {
    let harness = Harness::with_config(WebhookConfig {
        request_timeout: Duration::from_secs(2),
        ..WebhookConfig::default()
    });
    let stalled = futures::stream::pending::<Result<Bytes, std::io::Error>>();
    let request = Request::post("/validate")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from_stream(stalled))
        .unwrap();

    let (status, _) = harness.send(request).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(
        harness.health.metrics.request_count("validate", Outcome::Allowed),
        0
    );
}
