//! Hand landmark extraction.
//!
//! Pose estimation runs in an external engine reached over HTTP. The engine
//! receives a PNG of the decoded pixels plus detection options and answers
//! with the hands it found; the first hand above the confidence threshold
//! is the one used for the reading.

use crate::models::{Landmark, HAND_LANDMARK_COUNT};
use crate::services::image::{encode_png, ImageError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("Landmark engine request failed: {0}")]
    Network(String),

    #[error("Landmark engine error: {0}")]
    Engine(String),

    #[error("Landmark engine returned {found} keypoints for a hand, expected {expected}")]
    MalformedHand { found: usize, expected: usize },

    #[error(transparent)]
    Image(#[from] ImageError),
}

impl From<LandmarkError> for AppError {
    fn from(err: LandmarkError) -> Self {
        match err {
            LandmarkError::Image(inner) => inner.into(),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// Detector settings for single still images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionOptions {
    pub static_image_mode: bool,
    pub max_num_hands: usize,
    pub min_detection_confidence: f32,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            static_image_mode: true,
            max_num_hands: 1,
            min_detection_confidence: 0.5,
        }
    }
}

/// Finds hand keypoints in a decoded image.
#[async_trait]
pub trait LandmarkDetector: Send + Sync {
    /// `Ok(None)` when no hand passes the confidence threshold.
    async fn detect(&self, image: &RgbImage) -> Result<Option<Vec<Landmark>>, LandmarkError>;
}

/// Detector backed by a hand pose engine over HTTP.
pub struct RemoteLandmarkDetector {
    endpoint: String,
    options: DetectionOptions,
    client: Client,
}

impl RemoteLandmarkDetector {
    pub fn new(endpoint: impl Into<String>, options: DetectionOptions) -> Result<Self, LandmarkError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LandmarkError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            options,
            client,
        })
    }
}

#[async_trait]
impl LandmarkDetector for RemoteLandmarkDetector {
    async fn detect(&self, image: &RgbImage) -> Result<Option<Vec<Landmark>>, LandmarkError> {
        let png = encode_png(image)?;

        let request = DetectRequest {
            image_base64: STANDARD.encode(png),
            static_image_mode: self.options.static_image_mode,
            max_num_hands: self.options.max_num_hands,
            min_detection_confidence: self.options.min_detection_confidence,
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            width = image.width(),
            height = image.height(),
            "Requesting hand landmarks"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| LandmarkError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LandmarkError::Engine(format!("{}: {}", status, error_text)));
        }

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| LandmarkError::Engine(format!("Failed to parse response: {}", e)))?;

        select_hand(body.hands, &self.options)
    }
}

/// First hand at or above the confidence threshold, in engine order.
pub fn select_hand(
    hands: Vec<DetectedHand>,
    options: &DetectionOptions,
) -> Result<Option<Vec<Landmark>>, LandmarkError> {
    let hand = hands
        .into_iter()
        .find(|hand| hand.score >= options.min_detection_confidence);

    match hand {
        None => Ok(None),
        Some(hand) if hand.landmarks.len() != HAND_LANDMARK_COUNT => {
            Err(LandmarkError::MalformedHand {
                found: hand.landmarks.len(),
                expected: HAND_LANDMARK_COUNT,
            })
        }
        Some(hand) => Ok(Some(hand.landmarks)),
    }
}

/// Detector returning a fixed answer, for tests.
pub struct FixedLandmarkDetector {
    result: Result<Option<Vec<Landmark>>, String>,
    calls: AtomicUsize,
}

impl FixedLandmarkDetector {
    pub fn new(result: Option<Vec<Landmark>>) -> Self {
        Self {
            result: Ok(result),
            calls: AtomicUsize::new(0),
        }
    }

    /// A detector whose engine call always fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LandmarkDetector for FixedLandmarkDetector {
    async fn detect(&self, _image: &RgbImage) -> Result<Option<Vec<Landmark>>, LandmarkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(LandmarkError::Engine)
    }
}

// ============================================================================
// Engine Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct DetectRequest {
    image_base64: String,
    static_image_mode: bool,
    max_num_hands: usize,
    min_detection_confidence: f32,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    hands: Vec<DetectedHand>,
}

/// One hand as reported by the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectedHand {
    pub score: f32,
    pub landmarks: Vec<Landmark>,
}
