//! Shared setup for reading-service integration tests.
//!
//! Requests go straight through the router with `oneshot`; the store, chat
//! model and landmark engine are in-process fakes.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use http_body_util::BodyExt;
use image::{Rgb, RgbImage};
use reading_service::models::{Landmark, HAND_LANDMARK_COUNT};
use reading_service::services::image::encode_png;
use reading_service::services::landmarks::FixedLandmarkDetector;
use reading_service::services::providers::mock::MockChatProvider;
use reading_service::services::InMemoryReadingStore;
use reading_service::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const BOUNDARY: &str = "reading-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryReadingStore>,
    pub chat: Arc<MockChatProvider>,
    pub detector: Option<Arc<FixedLandmarkDetector>>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestApp {
    pub fn new(chat: MockChatProvider) -> Self {
        Self::build(chat, InMemoryReadingStore::new(), None, None)
    }

    pub fn with_store(chat: MockChatProvider, store: InMemoryReadingStore) -> Self {
        Self::build(chat, store, None, None)
    }

    pub fn with_detector(chat: MockChatProvider, detector: FixedLandmarkDetector) -> Self {
        Self::build(chat, InMemoryReadingStore::new(), Some(detector), None)
    }

    pub fn with_upload_limit(chat: MockChatProvider, max_upload_bytes: usize) -> Self {
        Self::build(
            chat,
            InMemoryReadingStore::new(),
            None,
            Some(max_upload_bytes),
        )
    }

    fn build(
        chat: MockChatProvider,
        store: InMemoryReadingStore,
        detector: Option<FixedLandmarkDetector>,
        max_upload_bytes: Option<usize>,
    ) -> Self {
        let store = Arc::new(store);
        let chat = Arc::new(chat);
        let detector = detector.map(Arc::new);

        let mut state = AppState::new(store.clone(), chat.clone());
        if let Some(detector) = &detector {
            state = state.with_landmark_detector(detector.clone());
        }
        if let Some(limit) = max_upload_bytes {
            state = state.with_max_upload_bytes(limit);
        }

        Self {
            router: build_router(state),
            store,
            chat,
            detector,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.post_raw(uri, "application/json", body.to_string().into_bytes())
            .await
    }

    pub async fn post_raw(&self, uri: &str, content_type: &str, body: Vec<u8>) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .expect("failed to build request");
        self.send(request).await
    }

    pub async fn post_form(&self, uri: &str, form: MultipartBody) -> TestResponse {
        let content_type = format!("multipart/form-data; boundary={}", BOUNDARY);
        self.post_raw(uri, &content_type, form.finish()).await
    }
}

/// Hand-assembled multipart/form-data body.
#[derive(Default)]
pub struct MultipartBody {
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.bytes.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, filename, content_type
            )
            .as_bytes(),
        );
        self.bytes.extend_from_slice(data);
        self.bytes.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.bytes
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.bytes
    }
}

pub fn png_bytes() -> Vec<u8> {
    encode_png(&RgbImage::from_pixel(8, 8, Rgb([210, 170, 140]))).expect("failed to encode png")
}

/// A minimal BMP: the magic header is all format sniffing looks at.
pub fn bmp_bytes() -> Vec<u8> {
    let mut bytes = b"BM".to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

pub fn png_base64() -> String {
    STANDARD.encode(png_bytes())
}

pub fn hand_landmarks() -> Vec<Landmark> {
    (0..HAND_LANDMARK_COUNT)
        .map(|i| Landmark {
            x: i as f32 / 100.0,
            y: 0.5,
            z: -0.01,
        })
        .collect()
}
