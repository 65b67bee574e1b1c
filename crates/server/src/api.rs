//! HTTP API for detection runs, health checks and Prometheus metrics

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use falconeye_lib::{
    anomaly, DetectionConfig, DetectionError, DetectionReport, DetectorMetrics, ErrorKind,
    Sample, StructuredLogger, TelemetryTable,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Detection settings for requests that carry no config
    pub detection_defaults: DetectionConfig,
    pub metrics: DetectorMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        detection_defaults: DetectionConfig,
        metrics: DetectorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            detection_defaults,
            metrics,
            logger,
        }
    }
}

/// Body of `POST /v1/detect`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    /// Rows of the table, checked for a shared channel set by the handler
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub config: Option<DetectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(flatten)]
    pub report: DetectionReport,
    pub ml_unavailable: bool,
    pub generated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: Option<ErrorKind>,
}

/// Errors returned by API handlers
pub enum ApiError {
    Detection(DetectionError),
    /// The request body could not be extracted
    Rejected(StatusCode, String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Detection(err) => {
                let status = match err.kind() {
                    ErrorKind::InvalidConfig | ErrorKind::InvalidTelemetry => StatusCode::BAD_REQUEST,
                    ErrorKind::InsufficientData | ErrorKind::ModelFit => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                };
                (
                    status,
                    ErrorBody {
                        error: err.to_string(),
                        kind: Some(err.kind()),
                    },
                )
            }
            ApiError::Rejected(status, message) => (
                status,
                ErrorBody {
                    error: message,
                    kind: None,
                },
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: message,
                    kind: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Liveness check
async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return ApiError::Internal(format!("failed to encode metrics: {}", err)).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Run detection over the posted table
///
/// Runs are CPU-bound and independent, so each one executes on the blocking
/// pool with its own table and config.
async fn detect(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::Rejected(rejection.status(), rejection.body_text()))?;

    let config = request
        .config
        .unwrap_or_else(|| state.detection_defaults.clone());
    let table = match TelemetryTable::new(request.samples) {
        Ok(table) => table,
        Err(err) => {
            state.metrics.record_failure(&err);
            state.logger.log_failure(&err);
            return Err(ApiError::Detection(err));
        }
    };

    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || anomaly::run(&table, &config))
        .await
        .map_err(|e| ApiError::Internal(format!("detection task failed: {}", e)))?;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(report) => {
            state.metrics.record_report(&report, elapsed);
            state.logger.log_run(&report, elapsed);
            Ok(Json(DetectResponse {
                ml_unavailable: report.ml_unavailable(),
                report,
                generated_at: chrono::Utc::now().timestamp(),
            }))
        }
        Err(err) => {
            state.metrics.record_failure(&err);
            state.logger.log_failure(&err);
            Err(ApiError::Detection(err))
        }
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/v1/detect", post(detect))
        .with_state(state)
}

/// Start the API server
pub async fn serve(addr: String, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
