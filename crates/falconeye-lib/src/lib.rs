//! FalconEye anomaly detection engine
//!
//! This crate provides:
//! - The telemetry table and detection configuration model
//! - Statistical threshold detection over a score channel
//! - Multivariate isolation-forest detection across feature channels
//! - Orchestration that merges detector flags into per-sample verdicts
//! - Metrics and structured logging for hosting services

pub mod anomaly;
pub mod error;
pub mod models;
pub mod observability;

pub use anomaly::{run, run_with_rng, DetectionReport, MlStatus, RunSummary, SystemStatus};
pub use error::{DetectionError, ErrorKind, Result};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
