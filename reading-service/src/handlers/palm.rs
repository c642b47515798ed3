use super::{complete_reading, ensure_model_configured, outcome, persist_reading};
use crate::dtos::{PalmRequest, PalmResponse};
use crate::models::{InputSummary, ReadingCollection, ReadingRecord};
use crate::services::image::decode_base64_image;
use crate::services::metrics;
use crate::services::prompts::{palm_prompt, NO_HAND_MESSAGE};
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::time::Instant;

/// POST /predict_palm
pub async fn predict_palm(
    State(state): State<AppState>,
    payload: Result<Json<PalmRequest>, JsonRejection>,
) -> Result<Json<PalmResponse>, AppError> {
    let started = Instant::now();
    let result = palm_reading(&state, payload).await;
    metrics::record_request(
        "predict_palm",
        outcome(&result),
        started.elapsed().as_secs_f64(),
    );
    result.map(Json)
}

async fn palm_reading(
    state: &AppState,
    payload: Result<Json<PalmRequest>, JsonRejection>,
) -> Result<PalmResponse, AppError> {
    ensure_model_configured(state)?;

    let Json(request) = payload.map_err(json_rejection)?;
    let encoded = request
        .image_base64
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("image_base64 is required")))?;

    let image = decode_base64_image(encoded)?;
    tracing::debug!(bytes = image.len(), mime = image.mime_type(), "Decoded palm image");

    let landmarks = match &state.landmark_detector {
        Some(detector) => {
            let pixels = image.to_rgb()?;
            match detector.detect(&pixels).await? {
                Some(points) => Some(points),
                None => {
                    tracing::info!(user_id = ?request.user_id, "No hand detected in palm image");
                    return Ok(PalmResponse {
                        prediction: NO_HAND_MESSAGE.to_string(),
                    });
                }
            }
        }
        None => None,
    };

    let prompt = palm_prompt(&image, landmarks.as_deref());
    let completion = complete_reading(state, &prompt).await?;

    let record = ReadingRecord::new(
        request.user_id.as_deref(),
        InputSummary::palm(encoded, landmarks.as_ref().map(Vec::len)),
        completion.text.clone(),
        &completion.model,
    );
    persist_reading(state, ReadingCollection::Palm, &record).await;

    Ok(PalmResponse {
        prediction: completion.text,
    })
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(anyhow::anyhow!(rejection.body_text()))
    } else {
        AppError::BadRequest(anyhow::anyhow!(rejection.body_text()))
    }
}
