pub mod health;
pub mod kundali;
pub mod metrics;
pub mod palm;

use crate::models::{ReadingCollection, ReadingRecord};
use crate::services::metrics as reading_metrics;
use crate::services::providers::{ChatCompletion, ChatRequest};
use crate::startup::AppState;
use service_core::error::AppError;
use std::time::Instant;

/// Fail fast when no model credentials are configured, before any input is read.
pub(crate) fn ensure_model_configured(state: &AppState) -> Result<(), AppError> {
    if state.chat.is_configured() {
        return Ok(());
    }
    tracing::error!("Chat model API key is not configured");
    Err(AppError::ConfigError(anyhow::anyhow!(
        "Chat model API key is not configured"
    )))
}

/// Call the chat model, recording latency, token usage and failures.
pub(crate) async fn complete_reading(
    state: &AppState,
    request: &ChatRequest,
) -> Result<ChatCompletion, AppError> {
    let started = Instant::now();

    match state.chat.complete(request).await {
        Ok(completion) => {
            reading_metrics::record_model_call(
                &completion.model,
                started.elapsed().as_secs_f64(),
                completion.input_tokens,
                completion.output_tokens,
            );
            tracing::info!(
                model = %completion.model,
                input_tokens = completion.input_tokens,
                output_tokens = completion.output_tokens,
                "Chat model call succeeded"
            );
            Ok(completion)
        }
        Err(e) => {
            reading_metrics::record_model_error(e.kind());
            tracing::error!(error = %e, error_type = e.kind(), "Chat model call failed");
            Err(e.into())
        }
    }
}

/// Append a reading record. Failures are logged and counted; the caller's
/// response does not change.
pub(crate) async fn persist_reading(
    state: &AppState,
    collection: ReadingCollection,
    record: &ReadingRecord,
) {
    if let Err(e) = state.store.append(collection, record).await {
        reading_metrics::record_db_error("insert", collection.name());
        tracing::error!(
            collection = collection.name(),
            user_id = %record.user_id,
            error = %e,
            "Failed to persist reading"
        );
    }
}

pub(crate) fn outcome<T>(result: &Result<T, AppError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.code(),
    }
}
