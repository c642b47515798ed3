use reading_service::config::ReadingConfig;
use reading_service::services::metrics::init_metrics;
use reading_service::startup::Application;
use service_core::observability::{init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = ReadingConfig::load()
        .map_err(|e| std::io::Error::other(format!("Configuration error: {}", e)))?;

    init_tracing(
        "reading-service",
        &config.common.log_level,
        config.otlp_endpoint.as_deref(),
    );
    init_metrics();

    let application = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::other(format!("Startup error: {}", e))
    })?;

    let result = application.run_until_stopped().await;
    shutdown_tracing();
    result
}
