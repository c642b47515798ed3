//! Prometheus metrics for reading-service.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::{Once, OnceLock};

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Request metrics
pub static READINGS_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static READINGS_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

// Model metrics
pub static MODEL_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static MODEL_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static MODEL_TOKENS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

// Database metrics
pub static DB_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

static INIT: Once = Once::new();

/// Initialize all metrics. Safe to call more than once; later calls are no-ops.
pub fn init_metrics() {
    INIT.call_once(register_metrics);
}

fn register_metrics() {
    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("readings_requests_total", "Total reading requests"),
        &["endpoint", "outcome"],
    );
    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "readings_request_duration_seconds",
            "Reading request duration in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["endpoint"],
    );
    let model_latency = HistogramVec::new(
        HistogramOpts::new("model_latency_seconds", "Chat model API latency in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["model"],
    );
    let model_errors = IntCounterVec::new(
        Opts::new("model_errors_total", "Total chat model errors"),
        &["error_type"],
    );
    let model_tokens = IntCounterVec::new(
        Opts::new("model_tokens_total", "Total tokens processed by the chat model"),
        &["model", "type"], // type: input, output
    );
    let db_errors = IntCounterVec::new(
        Opts::new("db_errors_total", "Total database errors"),
        &["operation", "collection"],
    );

    let (
        Ok(requests_total),
        Ok(request_duration),
        Ok(model_latency),
        Ok(model_errors),
        Ok(model_tokens),
        Ok(db_errors),
    ) = (
        requests_total,
        request_duration,
        model_latency,
        model_errors,
        model_tokens,
        db_errors,
    )
    else {
        tracing::error!("Failed to create Prometheus metrics; metrics disabled");
        return;
    };

    let registered = [
        registry.register(Box::new(requests_total.clone())),
        registry.register(Box::new(request_duration.clone())),
        registry.register(Box::new(model_latency.clone())),
        registry.register(Box::new(model_errors.clone())),
        registry.register(Box::new(model_tokens.clone())),
        registry.register(Box::new(db_errors.clone())),
    ];
    if let Some(Err(e)) = registered.into_iter().find(Result::is_err) {
        tracing::error!(error = %e, "Failed to register Prometheus metrics; metrics disabled");
        return;
    }

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = READINGS_REQUESTS_TOTAL.set(requests_total);
    let _ = READINGS_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = MODEL_LATENCY_SECONDS.set(model_latency);
    let _ = MODEL_ERRORS_TOTAL.set(model_errors);
    let _ = MODEL_TOKENS_TOTAL.set(model_tokens);
    let _ = DB_ERRORS_TOTAL.set(db_errors);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record a finished reading request.
pub fn record_request(endpoint: &str, outcome: &str, duration_secs: f64) {
    if let Some(counter) = READINGS_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[endpoint, outcome]).inc();
    }
    if let Some(histogram) = READINGS_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }
}

/// Record model latency and token usage for a successful call.
pub fn record_model_call(model: &str, duration_secs: f64, input_tokens: u32, output_tokens: u32) {
    if let Some(histogram) = MODEL_LATENCY_SECONDS.get() {
        histogram.with_label_values(&[model]).observe(duration_secs);
    }
    if let Some(counter) = MODEL_TOKENS_TOTAL.get() {
        counter
            .with_label_values(&[model, "input"])
            .inc_by(input_tokens as u64);
        counter
            .with_label_values(&[model, "output"])
            .inc_by(output_tokens as u64);
    }
}

/// Record a model error.
pub fn record_model_error(error_type: &str) {
    if let Some(counter) = MODEL_ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type]).inc();
    }
}

/// Record a database error.
pub fn record_db_error(operation: &str, collection: &str) {
    if let Some(counter) = DB_ERRORS_TOTAL.get() {
        counter.with_label_values(&[operation, collection]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_requests_show_up_in_exposition() {
        init_metrics();
        init_metrics();

        record_request("predict_palm", "success", 0.42);
        record_model_error("api_error");

        let text = get_metrics();
        assert!(text.contains("readings_requests_total"));
        assert!(text.contains("endpoint=\"predict_palm\""));
        assert!(text.contains("model_errors_total"));
    }
}
