//! FalconEye detection service
//!
//! Serves independent detection runs over HTTP alongside health and
//! Prometheus endpoints.

use std::sync::Arc;

use anyhow::Result;
use falconeye_lib::{DetectorMetrics, StructuredLogger};
use falconeye_server::{api, config};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // JSON output with env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::ServerConfig::load()?;
    info!(instance = %config.instance, addr = %config.listen_addr(), "Service configured");

    let detection_defaults = config.default_detection();
    detection_defaults.validate()?;

    let metrics = DetectorMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(SERVICE_VERSION);

    let state = Arc::new(api::AppState::new(detection_defaults, metrics, logger.clone()));

    tokio::select! {
        result = api::serve(config.listen_addr(), state) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
