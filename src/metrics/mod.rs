use anyhow::{Context, Result};
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use tokio::task::JoinHandle;
use tracing::{error, info};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Scheduler metrics
    pub static ref TICKS_TOTAL: IntCounter = IntCounter::new(
        "kubert_ticks_total",
        "Total number of reconciliation ticks started"
    ).unwrap();

    // Controller metrics
    pub static ref RECONCILE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "kubert_reconcile_duration_seconds",
            "Time spent reconciling a single workload"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0])
    ).unwrap();

    pub static ref RECONCILE_ERRORS: IntCounter = IntCounter::new(
        "kubert_reconcile_errors_total",
        "Total number of workload reconciliations that failed"
    ).unwrap();

    pub static ref UPDATES_APPLIED: IntCounter = IntCounter::new(
        "kubert_updates_applied_total",
        "Total number of workload image updates written"
    ).unwrap();

    pub static ref WORKLOADS_UNCHANGED: IntCounter = IntCounter::new(
        "kubert_workloads_unchanged_total",
        "Total number of reconciliations that found the workload up to date"
    ).unwrap();

    // Registry metrics
    pub static ref REGISTRY_QUERIES: IntCounter = IntCounter::new(
        "kubert_registry_queries_total",
        "Total number of registry tag listings requested"
    ).unwrap();

    pub static ref REGISTRY_ERRORS: IntCounter = IntCounter::new(
        "kubert_registry_errors_total",
        "Total number of registry tag listings that failed"
    ).unwrap();
}

pub fn register_metrics() {
    REGISTRY.register(Box::new(TICKS_TOTAL.clone())).ok();
    REGISTRY.register(Box::new(RECONCILE_DURATION.clone())).ok();
    REGISTRY.register(Box::new(RECONCILE_ERRORS.clone())).ok();
    REGISTRY.register(Box::new(UPDATES_APPLIED.clone())).ok();
    REGISTRY
        .register(Box::new(WORKLOADS_UNCHANGED.clone()))
        .ok();
    REGISTRY.register(Box::new(REGISTRY_QUERIES.clone())).ok();
    REGISTRY.register(Box::new(REGISTRY_ERRORS.clone())).ok();

    info!("Metrics registered");
}

pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
}

pub async fn start_metrics_server(addr: &str) -> Result<JoinHandle<()>> {
    register_metrics();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?;

    info!("Starting metrics server on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            error!("Metrics server failed: {}", e);
        }
    });

    Ok(handle)
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        buffer,
    )
        .into_response()
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
