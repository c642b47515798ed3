use super::{complete_reading, ensure_model_configured, outcome, persist_reading};
use crate::dtos::{KundaliForm, KundaliResponse, UploadedFile};
use crate::models::{InputSummary, ReadingCollection, ReadingRecord};
use crate::services::metrics;
use crate::services::prompts::{kundali_prompt, KundaliInput, KundaliPrompt};
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{Multipart, MultipartError, MultipartRejection},
        State,
    },
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::time::Instant;

/// POST /predict_kundli
pub async fn predict_kundli(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<KundaliResponse>, AppError> {
    let started = Instant::now();
    let result = kundali_reading(&state, multipart).await;
    metrics::record_request(
        "predict_kundli",
        outcome(&result),
        started.elapsed().as_secs_f64(),
    );
    result.map(Json)
}

async fn kundali_reading(
    state: &AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<KundaliResponse, AppError> {
    ensure_model_configured(state)?;

    let multipart = multipart
        .map_err(|rejection| AppError::BadRequest(anyhow::anyhow!(rejection.body_text())))?;
    let form = read_form(multipart).await?;
    let user_id = form.user_id.clone();
    let input = form.into_input()?;

    let prompt = match kundali_prompt(&input) {
        KundaliPrompt::Model(prompt) => prompt,
        KundaliPrompt::Rejected(message) => {
            tracing::info!(user_id = ?user_id, "Kundali upload rejected without a model call");
            return Ok(KundaliResponse {
                analysis: message.to_string(),
            });
        }
    };

    let completion = complete_reading(state, &prompt).await?;

    if let Some(summary) = input_summary(input) {
        let record = ReadingRecord::new(
            user_id.as_deref(),
            summary,
            completion.text.clone(),
            &completion.model,
        );
        persist_reading(state, ReadingCollection::Kundali, &record).await;
    }

    Ok(KundaliResponse {
        analysis: completion.text,
    })
}

async fn read_form(mut multipart: Multipart) -> Result<KundaliForm, AppError> {
    let mut form = KundaliForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;

                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    form.file = Some(UploadedFile {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "name" | "dob" | "tob" | "place" | "user_id" => {
                let value = field.text().await.map_err(multipart_error)?;
                let slot = match name.as_str() {
                    "name" => &mut form.name,
                    "dob" => &mut form.dob,
                    "tob" => &mut form.tob,
                    "place" => &mut form.place,
                    _ => &mut form.user_id,
                };
                *slot = Some(value);
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown kundali form field");
            }
        }
    }

    Ok(form)
}

fn input_summary(input: KundaliInput) -> Option<InputSummary> {
    match input {
        KundaliInput::Details(details) => Some(InputSummary::Details {
            name: details.name,
            dob: details.dob,
            tob: details.tob,
            place: details.place,
        }),
        KundaliInput::Image {
            filename,
            content_type,
            name,
            ..
        } => Some(InputSummary::Image {
            filename,
            content_type,
            name,
        }),
        KundaliInput::Pdf { .. } => None,
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(anyhow::anyhow!(err.body_text()))
    } else {
        AppError::BadRequest(anyhow::anyhow!(err.body_text()))
    }
}
