use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::InternalError(_) => "internal_error",
            AppError::BadGateway(_) => "upstream_error",
            AppError::ServiceUnavailable(_) => "service_unavailable",
            AppError::DatabaseError(_) => "database_error",
            AppError::ConfigError(_) => "configuration_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_) | AppError::DatabaseError(_) | AppError::ConfigError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            code: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let status = self.status();
        let code = self.code();

        let (error_message, details) = match self {
            AppError::BadRequest(err) => (err.to_string(), None),
            AppError::PayloadTooLarge(err) => (err.to_string(), None),
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "Internal server error");
                ("Internal server error".to_string(), None)
            }
            AppError::BadGateway(msg) => (format!("Bad Gateway: {}", msg), None),
            AppError::ServiceUnavailable(msg) => ("Service unavailable".to_string(), Some(msg)),
            AppError::DatabaseError(err) => ("Database error".to_string(), Some(err.to_string())),
            AppError::ConfigError(err) => {
                ("Configuration error".to_string(), Some(err.to_string()))
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                code,
                details,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn bad_request_keeps_message() {
        let (status, body) =
            body_json(AppError::BadRequest(anyhow::anyhow!("Only PDF or Image supported"))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Only PDF or Image supported");
        assert_eq!(body["code"], "bad_request");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn config_error_is_500_with_details() {
        let (status, body) =
            body_json(AppError::ConfigError(anyhow::anyhow!("OPENAI_API_KEY not set"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "configuration_error");
        assert_eq!(body["details"], "OPENAI_API_KEY not set");
    }

    #[tokio::test]
    async fn internal_error_hides_cause() {
        let (status, body) =
            body_json(AppError::InternalError(anyhow::anyhow!("secret stack"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn upstream_failures_have_distinct_codes() {
        let gateway = AppError::BadGateway("model down".to_string());
        let unavailable = AppError::ServiceUnavailable("rate limited".to_string());

        assert_eq!(gateway.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_ne!(gateway.code(), unavailable.code());
    }
}
