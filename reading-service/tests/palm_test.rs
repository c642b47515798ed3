//! Integration tests for POST /predict_palm.

mod common;

use axum::http::StatusCode;
use common::{bmp_bytes, hand_landmarks, png_base64, TestApp};
use reading_service::models::{InputSummary, ReadingCollection, ANONYMOUS_USER};
use reading_service::services::landmarks::FixedLandmarkDetector;
use reading_service::services::prompts::{NO_HAND_MESSAGE, PALM_MAX_TOKENS, PALM_SYSTEM_ROLE};
use reading_service::services::providers::mock::MockChatProvider;
use reading_service::services::providers::Role;
use reading_service::services::InMemoryReadingStore;
use serde_json::json;

#[tokio::test]
async fn palm_reading_returns_prediction_and_persists_it() {
    let app = TestApp::new(MockChatProvider::replying("Your heart line is long."));

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": png_base64() }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["prediction"], "Your heart line is long.");

    let records = app.store.records(ReadingCollection::Palm);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, ANONYMOUS_USER);
    assert_eq!(records[0].prediction, "Your heart line is long.");
    assert_eq!(records[0].model, "mock-model");
    match &records[0].input {
        InputSummary::Palm {
            image_prefix,
            landmark_count,
        } => {
            assert!(png_base64().starts_with(image_prefix.as_str()));
            assert!(image_prefix.len() <= 100);
            assert_eq!(*landmark_count, None);
        }
        other => panic!("unexpected input summary {:?}", other),
    }
    assert!(app.store.records(ReadingCollection::Kundali).is_empty());
}

#[tokio::test]
async fn palm_prompt_carries_role_and_image() {
    let app = TestApp::new(MockChatProvider::replying("ok"));

    app.post_json(
        "/predict_palm",
        &json!({ "image_base64": png_base64(), "user_id": "u-7" }),
    )
    .await;

    let requests = app.chat.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].max_tokens, PALM_MAX_TOKENS);
    assert_eq!(requests[0].messages[0].role, Role::System);
    assert_eq!(requests[0].messages[0].text(), PALM_SYSTEM_ROLE);
    assert!(requests[0].messages[1].has_image());

    let records = app.store.records(ReadingCollection::Palm);
    assert_eq!(records[0].user_id, "u-7");
}

#[tokio::test]
async fn legacy_image_field_is_accepted() {
    let app = TestApp::new(MockChatProvider::replying("ok"));

    let response = app
        .post_json("/predict_palm", &json!({ "image": png_base64() }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn data_uri_prefix_is_stripped() {
    let app = TestApp::new(MockChatProvider::replying("ok"));
    let image = format!("data:image/png;base64,{}", png_base64());

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": image }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn missing_image_is_bad_request() {
    let app = TestApp::new(MockChatProvider::replying("ok"));

    let response = app
        .post_json("/predict_palm", &json!({ "user_id": "u-1" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["code"], "bad_request");
    assert_eq!(app.chat.call_count(), 0);
}

#[tokio::test]
async fn invalid_base64_is_bad_request() {
    let app = TestApp::new(MockChatProvider::replying("ok"));

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": "@@not-base64@@" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.chat.call_count(), 0);
    assert!(app.store.records(ReadingCollection::Palm).is_empty());
}

#[tokio::test]
async fn non_image_payload_is_bad_request() {
    let app = TestApp::new(MockChatProvider::replying("ok"));

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": "aGVsbG8gd29ybGQ=" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bmp_image_is_rejected_before_the_model() {
    let app = TestApp::new(MockChatProvider::replying("ok"));
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bmp_bytes());

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": encoded }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["code"], "bad_request");
    assert_eq!(app.chat.call_count(), 0);
    assert!(app.store.records(ReadingCollection::Palm).is_empty());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = TestApp::new(MockChatProvider::replying("ok"));

    let response = app
        .post_raw("/predict_palm", "application/json", b"{not json".to_vec())
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["code"], "bad_request");
}

#[tokio::test]
async fn missing_api_key_fails_before_reading_payload() {
    let app = TestApp::new(MockChatProvider::unconfigured());

    let response = app
        .post_raw("/predict_palm", "application/json", b"{not json".to_vec())
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json()["code"], "configuration_error");
    assert!(app.store.records(ReadingCollection::Palm).is_empty());
}

#[tokio::test]
async fn model_failure_is_bad_gateway_and_not_persisted() {
    let app = TestApp::new(MockChatProvider::failing("model exploded"));

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": png_base64() }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    let body = response.json();
    assert_eq!(body["code"], "upstream_error");
    assert!(body.get("prediction").is_none());
    assert!(app.store.records(ReadingCollection::Palm).is_empty());
}

#[tokio::test]
async fn rate_limited_model_is_service_unavailable() {
    let app = TestApp::new(MockChatProvider::rate_limited());

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": png_base64() }))
        .await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json()["code"], "service_unavailable");
}

#[tokio::test]
async fn no_hand_detected_skips_the_model() {
    let app = TestApp::with_detector(
        MockChatProvider::replying("should not be used"),
        FixedLandmarkDetector::new(None),
    );

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": png_base64() }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["prediction"], NO_HAND_MESSAGE);
    assert_eq!(app.chat.call_count(), 0);
    assert!(app.store.records(ReadingCollection::Palm).is_empty());
    assert_eq!(app.detector.as_ref().map(|d| d.call_count()), Some(1));
}

#[tokio::test]
async fn detected_landmarks_are_listed_in_prompt() {
    let app = TestApp::with_detector(
        MockChatProvider::replying("Strong fate line."),
        FixedLandmarkDetector::new(Some(hand_landmarks())),
    );

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": png_base64() }))
        .await;

    assert_eq!(response.status, StatusCode::OK);

    let prompt = app.chat.requests()[0].messages[1].text();
    assert!(prompt.contains("  0: (0.0000, 0.5000, -0.0100)"));
    assert!(prompt.contains("  20: (0.2000, 0.5000, -0.0100)"));
    assert!(prompt.find("  3:").unwrap() < prompt.find("  4:").unwrap());

    let records = app.store.records(ReadingCollection::Palm);
    assert!(matches!(
        records[0].input,
        InputSummary::Palm {
            landmark_count: Some(21),
            ..
        }
    ));
}

#[tokio::test]
async fn landmark_engine_failure_is_bad_gateway() {
    let app = TestApp::with_detector(
        MockChatProvider::replying("should not be used"),
        FixedLandmarkDetector::failing("engine unavailable"),
    );

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": png_base64() }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.json()["code"], "upstream_error");
    assert_eq!(app.chat.call_count(), 0);
    assert!(app.store.records(ReadingCollection::Palm).is_empty());
}

#[tokio::test]
async fn undecodable_pixels_are_bad_request_when_detecting() {
    let app = TestApp::with_detector(
        MockChatProvider::replying("ok"),
        FixedLandmarkDetector::new(Some(hand_landmarks())),
    );
    let mut truncated = common::png_bytes();
    truncated.truncate(24);
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, truncated);

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": encoded }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.chat.call_count(), 0);
}

#[tokio::test]
async fn storage_failure_does_not_change_response() {
    let app = TestApp::with_store(
        MockChatProvider::replying("Still a reading."),
        InMemoryReadingStore::failing(),
    );

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": png_base64() }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["prediction"], "Still a reading.");
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let app = TestApp::with_upload_limit(MockChatProvider::replying("ok"), 1024);
    let image = "A".repeat(4096);

    let response = app
        .post_json("/predict_palm", &json!({ "image_base64": image }))
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.json()["code"], "payload_too_large");
}
