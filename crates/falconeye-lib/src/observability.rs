//! Observability for detection hosts
//!
//! Provides:
//! - Prometheus metrics (run latency, anomalies flagged, ML degradations, failures)
//! - Structured logging of run outcomes with tracing
//!
//! Detection runs never touch these; the hosting service records them after
//! each run completes.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::anomaly::{DetectionReport, MlStatus};
use crate::error::DetectionError;

/// Histogram buckets for run latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

struct DetectorMetricsInner {
    run_latency_seconds: Histogram,
    runs_total: IntCounter,
    failed_runs_total: IntCounterVec,
    anomalies_flagged_total: IntCounter,
    ml_degraded_total: IntCounterVec,
    last_table_samples: IntGauge,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            run_latency_seconds: register_histogram!(
                "falconeye_run_latency_seconds",
                "Time spent in a full detection run",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register run_latency_seconds"),

            runs_total: register_int_counter!(
                "falconeye_runs_total",
                "Total number of completed detection runs"
            )
            .expect("Failed to register runs_total"),

            failed_runs_total: register_int_counter_vec!(
                "falconeye_failed_runs_total",
                "Total number of detection runs that returned an error",
                &["kind"]
            )
            .expect("Failed to register failed_runs_total"),

            anomalies_flagged_total: register_int_counter!(
                "falconeye_anomalies_flagged_total",
                "Total number of samples flagged by any enabled detector"
            )
            .expect("Failed to register anomalies_flagged_total"),

            ml_degraded_total: register_int_counter_vec!(
                "falconeye_ml_degraded_total",
                "Runs that fell back to statistical-only detection",
                &["reason"]
            )
            .expect("Failed to register ml_degraded_total"),

            last_table_samples: register_int_gauge!(
                "falconeye_last_table_samples",
                "Number of samples in the most recent table"
            )
            .expect("Failed to register last_table_samples"),
        }
    }
}

/// Lightweight handle to the global detector metrics
///
/// Multiple clones share the same underlying collectors.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new)
    }

    /// Record a completed run
    pub fn record_report(&self, report: &DetectionReport, duration_secs: f64) {
        let inner = self.inner();
        inner.run_latency_seconds.observe(duration_secs);
        inner.runs_total.inc();
        inner
            .anomalies_flagged_total
            .inc_by(report.summary.total_anomalies as u64);
        inner
            .last_table_samples
            .set(report.summary.total_samples as i64);

        if let MlStatus::Unavailable { reason, .. } = &report.ml_status {
            inner
                .ml_degraded_total
                .with_label_values(&[&reason.to_string()])
                .inc();
        }
    }

    /// Record a run that returned an error
    pub fn record_failure(&self, err: &DetectionError) {
        self.inner()
            .failed_runs_total
            .with_label_values(&[&err.kind().to_string()])
            .inc();
    }

    pub fn runs_total(&self) -> u64 {
        self.inner().runs_total.get()
    }
}

/// Structured logger for detection host events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a completed detection run
    pub fn log_run(&self, report: &DetectionReport, duration_secs: f64) {
        let summary = &report.summary;
        match &report.ml_status {
            MlStatus::Unavailable { reason, message } => {
                warn!(
                    event = "detection_run",
                    instance = %self.instance,
                    samples = summary.total_samples,
                    anomalies = summary.total_anomalies,
                    status = %summary.status,
                    ml_unavailable = true,
                    reason = %reason,
                    details = %message,
                    duration_secs = duration_secs,
                    "Detection run completed without multivariate detector"
                );
            }
            _ => {
                info!(
                    event = "detection_run",
                    instance = %self.instance,
                    samples = summary.total_samples,
                    anomalies = summary.total_anomalies,
                    statistical_anomalies = summary.statistical_anomalies,
                    ml_anomalies = summary.ml_anomalies,
                    status = %summary.status,
                    threshold = report.baseline.threshold,
                    duration_secs = duration_secs,
                    "Detection run completed"
                );
            }
        }
    }

    /// Log a rejected run
    pub fn log_failure(&self, err: &DetectionError) {
        warn!(
            event = "detection_failed",
            instance = %self.instance,
            kind = %err.kind(),
            error = %err,
            "Detection run rejected"
        );
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            version = %version,
            "FalconEye detection service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "FalconEye detection service shutting down"
        );
    }
}
