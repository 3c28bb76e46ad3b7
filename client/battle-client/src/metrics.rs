use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::ApiError;

lazy_static! {
    // Backend calls
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "battle_api_requests_total",
        "Total number of game backend requests",
        &["endpoint", "status"]
    )
    .unwrap();

    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "battle_api_request_duration_seconds",
        "Game backend request duration in seconds",
        &["endpoint"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Battle metrics
    pub static ref ANSWERS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "battle_answers_submitted_total",
        "Total number of answers submitted",
        &["status", "origin"]
    )
    .unwrap();

    pub static ref ROUNDS_STARTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "battle_rounds_started_total",
        "Total number of rounds started",
        &["question_type"]
    )
    .unwrap();

    pub static ref TIMER_EXPIRATIONS_TOTAL: IntCounter = register_int_counter!(
        "battle_timer_expirations_total",
        "Total number of rounds that ran out of time"
    )
    .unwrap();

    pub static ref BATTLES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "battles_total",
        "Total number of finished battles",
        &["outcome"]
    )
    .unwrap();

    pub static ref BATTLES_ACTIVE: IntGauge = register_int_gauge!(
        "battles_active",
        "Number of battles currently in progress"
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track a backend call with metrics
pub async fn track_api_call<F, T>(endpoint: &str, future: F) -> Result<T, ApiError>
where
    F: std::future::Future<Output = Result<T, ApiError>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = match &result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    };

    API_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();

    API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint])
        .observe(duration);

    result
}
