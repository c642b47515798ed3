//! Remote hand landmark detector against a mocked engine.

use image::RgbImage;
use reading_service::services::landmarks::{
    DetectionOptions, LandmarkDetector, LandmarkError, RemoteLandmarkDetector,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn hand(score: f32, points: usize) -> serde_json::Value {
    let landmarks: Vec<_> = (0..points)
        .map(|i| json!({ "x": i as f32 / 100.0, "y": 0.25, "z": 0.0 }))
        .collect();
    json!({ "score": score, "landmarks": landmarks })
}

fn detector(server: &MockServer) -> RemoteLandmarkDetector {
    RemoteLandmarkDetector::new(server.uri(), DetectionOptions::default())
        .expect("failed to build detector")
}

#[tokio::test]
async fn confident_hand_returns_ordered_landmarks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "static_image_mode": true,
            "max_num_hands": 1,
            "min_detection_confidence": 0.5
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "hands": [hand(0.97, 21)] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let landmarks = detector(&server)
        .detect(&RgbImage::new(16, 16))
        .await
        .expect("detection failed")
        .expect("hand expected");

    assert_eq!(landmarks.len(), 21);
    assert_eq!(landmarks[0].x, 0.0);
    assert_eq!(landmarks[20].x, 0.2);
}

#[tokio::test]
async fn no_hands_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hands": [] })))
        .mount(&server)
        .await;

    let result = detector(&server).detect(&RgbImage::new(4, 4)).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn low_confidence_hand_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "hands": [hand(0.2, 21)] })),
        )
        .mount(&server)
        .await;

    let result = detector(&server).detect(&RgbImage::new(4, 4)).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn engine_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("engine crashed"))
        .mount(&server)
        .await;

    let err = detector(&server)
        .detect(&RgbImage::new(4, 4))
        .await
        .unwrap_err();

    assert!(matches!(err, LandmarkError::Engine(_)));
}
