//! Integration tests for the scanner API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use orphan_scanner::api::{create_router, AppState};
use scanner_lib::{
    classifier::Thresholds,
    health::{components, HealthRegistry, PassSummary},
    observability::{ScannerMetrics, StructuredLogger},
    GaugeReporter, PassRunner, PassSettings, RuleBook, SnapshotSource,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let state = Arc::new(AppState::new(health_registry));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

fn completed_pass() -> PassSummary {
    PassSummary {
        finished_at: Utc::now(),
        duration_ms: 850,
        resources_scanned: 4,
        resources_skipped: 0,
        findings: 1,
        failed_types: Vec::new(),
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"][components::INVENTORY].is_object());
    assert!(health["components"][components::SCHEDULER].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::METRIC_SOURCE, "2 resource(s) skipped in last pass")
        .await;

    let (status, body) = get(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"][components::METRIC_SOURCE]["message"],
        "2 resource(s) skipped in last pass"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::SCHEDULER, "scheduler stopped")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_pass() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_after_completed_pass() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_pass(completed_pass()).await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_pass_done_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_pass(completed_pass()).await;
    state
        .health_registry
        .set_unhealthy(components::SCHEDULER, "scheduler stopped")
        .await;

    let (status, _body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;

    let metrics = ScannerMetrics::new();
    metrics.observe_pass_duration(42.0);
    metrics.inc_passes();
    metrics.set_region("ap-southeast-2");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("orphan_scanner_pass_duration_seconds_bucket"));
    assert!(metrics_text.contains("orphan_scanner_passes_total"));
    assert!(metrics_text.contains("aws_region_name{aws_region=\"ap-southeast-2\"} 1"));
}

const SNAPSHOT: &str = r#"{
    "resources": [
        {"resource_type": "EC2", "id": "i-0idle", "attributes": {"state": {"text": "running"}}},
        {"resource_type": "EIP", "id": "198.51.100.7"}
    ],
    "metrics": [
        {"resource_type": "EC2", "resource_id": "i-0idle", "metric": "DiskReadOps", "value": 0}
    ]
}"#;

#[tokio::test]
async fn test_completed_pass_is_served_on_all_endpoints() {
    let dir = TempDir::new().unwrap();
    let inventory = dir.path().join("inventory.json");
    std::fs::write(&inventory, SNAPSHOT).unwrap();

    let (app, state) = setup_test_app().await;
    let source = Arc::new(SnapshotSource::new(&inventory));
    let runner = PassRunner::new(
        source.clone(),
        source,
        RuleBook::new(test_thresholds()),
        PassSettings::default(),
        StructuredLogger::new("eu-west-1"),
    )
    .with_reporter(Arc::new(GaugeReporter::new(ScannerMetrics::new())))
    .with_health(state.health_registry.clone());

    let report = runner.run_pass(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.total_findings(), 2);

    let (status, _) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let (_, metrics_text) = get(app.clone(), "/metrics").await;
    assert!(metrics_text.contains("instance_id=\"i-0idle\""));
    assert!(metrics_text.contains("orphaned_eips{eip_id=\"198.51.100.7\"} 1"));

    let (_, body) = get(app, "/healthz").await;
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["last_pass"]["findings"], 2);
}

fn test_thresholds() -> Thresholds {
    serde_json::from_value(serde_json::json!({
        "diskReadOps": 0, "diskWriteOps": 0, "cpu_utilisation_threshold": 20,
        "diskReadBytes": 0, "diskWriteBytes": 0, "min_statusCheckFailed": 1,
        "healthyHostCount_threshold": 0, "requestCount_threshold": 500,
        "threshold1": 60, "threshold2": 20, "threshold_days": 30,
        "dbconnections_threshold": 0, "readLatency_threshold": 0.0001,
        "writeLatency_threshold": 0.0001, "freeableMem_threshold": 1073741824,
        "freeStorage_threhsold": 1073741824, "cpuSurplus_threshold": 0,
        "burstBalance_threshold": 20, "ebsIOBalance_threshold": 50,
        "ebsByteBalance_threshold": 50
    }))
    .unwrap()
}
