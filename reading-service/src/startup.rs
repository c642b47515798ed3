//! Application startup and lifecycle management.

use crate::config::{ReadingConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::handlers;
use crate::services::landmarks::{DetectionOptions, LandmarkDetector, RemoteLandmarkDetector};
use crate::services::providers::openai::OpenAiChatProvider;
use crate::services::providers::ChatProvider;
use crate::services::{ReadingDb, ReadingStore};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{request_id_middleware, security_headers_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReadingStore>,
    pub chat: Arc<dyn ChatProvider>,
    /// Set only when a landmark service is configured.
    pub landmark_detector: Option<Arc<dyn LandmarkDetector>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn ReadingStore>, chat: Arc<dyn ChatProvider>) -> Self {
        Self {
            store,
            chat,
            landmark_detector: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_landmark_detector(mut self, detector: Arc<dyn LandmarkDetector>) -> Self {
        self.landmark_detector = Some(detector);
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/predict_palm", post(handlers::palm::predict_palm))
        .route("/predict_kundli", post(handlers::kundali::predict_kundli))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ReadingConfig) -> Result<Self, AppError> {
        let db = ReadingDb::connect(
            config.mongodb.uri.expose_secret(),
            &config.mongodb.database,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            e
        })?;

        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        if !config.has_api_key() {
            tracing::warn!("OPENAI_API_KEY is not set; reading requests will fail until it is");
        }
        let chat: Arc<dyn ChatProvider> =
            Arc::new(OpenAiChatProvider::new(config.openai.clone()).map_err(|e| {
                tracing::error!("Failed to initialize chat provider: {}", e);
                AppError::InternalError(anyhow::anyhow!(e.to_string()))
            })?);
        tracing::info!(model = %config.openai.model, "Initialized OpenAI chat provider");

        let mut state = AppState::new(Arc::new(db), chat)
            .with_max_upload_bytes(config.limits.max_upload_bytes);

        if let Some(url) = &config.landmarks.service_url {
            let options = DetectionOptions {
                static_image_mode: true,
                max_num_hands: config.landmarks.max_num_hands,
                min_detection_confidence: config.landmarks.min_detection_confidence,
            };
            let detector = RemoteLandmarkDetector::new(url.clone(), options).map_err(|e| {
                tracing::error!("Failed to initialize landmark detector: {}", e);
                AppError::InternalError(anyhow::anyhow!(e.to_string()))
            })?;
            state = state.with_landmark_detector(Arc::new(detector));
            tracing::info!(endpoint = %url, "Hand landmark extraction enabled");
        } else {
            tracing::info!("LANDMARK_SERVICE_URL not set; palm readings use the image only");
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Reading service listening on port {}", port);

        Ok(Self { listener, state })
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                e
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
