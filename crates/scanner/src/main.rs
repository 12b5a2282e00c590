//! Orphan Scanner - periodic detection of orphaned cloud resources
//!
//! This binary runs detection passes over an inventory snapshot, exports
//! flagged resources as Prometheus gauges and CSV files, and serves health
//! and metrics endpoints.

use anyhow::Result;
use orphan_scanner::{api, config::Settings};
use scanner_lib::{
    health::HealthRegistry,
    observability::{ScannerMetrics, StructuredLogger},
    CsvReporter, GaugeReporter, PassRunner, Scheduler, SnapshotSource,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SCANNER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting orphan-scanner");

    let settings = Settings::load()?;
    info!(
        region = %settings.scanner.region_name,
        inventory = %settings.scanner.inventory_path.display(),
        output_dir = %settings.scanner.output_dir.display(),
        "Scanner configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let metrics = ScannerMetrics::new();
    metrics.set_region(&settings.scanner.region_name);

    let logger = StructuredLogger::new(&settings.scanner.region_name);
    logger.log_startup(SCANNER_VERSION, settings.scanner.scan_interval_secs);

    let source = Arc::new(SnapshotSource::new(&settings.scanner.inventory_path));
    let runner = PassRunner::new(
        source.clone(),
        source,
        settings.rule_book(),
        settings.pass_settings(),
        logger.clone(),
    )
    .with_reporter(Arc::new(GaugeReporter::new(metrics)))
    .with_reporter(Arc::new(CsvReporter::new(&settings.scanner.output_dir)))
    .with_health(health_registry.clone());

    let scheduler = Scheduler::new(Arc::new(runner), settings.scan_interval())
        .with_health(health_registry.clone());

    let cancel = CancellationToken::new();
    let app_state = Arc::new(api::AppState::new(health_registry.clone()));
    let api_handle = tokio::spawn(api::serve(
        settings.scanner.api_port,
        app_state,
        cancel.clone(),
    ));

    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move { scheduler.run(scheduler_cancel).await });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    cancel.cancel();

    match scheduler_handle.await {
        Ok(passes) => info!(passes = passes, "Scheduler stopped"),
        Err(e) => warn!(error = %e, "Scheduler task failed"),
    }
    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server exited with error"),
        Err(e) => warn!(error = %e, "API server task failed"),
        Ok(Ok(())) => {}
    }

    Ok(())
}
