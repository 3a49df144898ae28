//! Probe and metrics endpoints for the operator process.
//!
//! `/healthz` answers while the process is up, `/readyz` once the controller
//! stream is running and until shutdown starts, `/metrics` serves the
//! `statefulworkload_*` families.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Per-workload metric labels
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct WorkloadLabels {
    pub namespace: String,
    pub name: String,
}

impl WorkloadLabels {
    fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl EncodeLabelSet for WorkloadLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// `action` is one of `create`, `delete`, `replace`
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct MutationLabels {
    pub action: String,
}

impl EncodeLabelSet for MutationLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("action", self.action.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

pub struct Metrics {
    pub reconciliations_total: Family<WorkloadLabels, Counter>,
    pub reconciliation_errors_total: Family<WorkloadLabels, Counter>,
    pub reconcile_duration_seconds: Family<WorkloadLabels, Histogram>,
    pub pod_mutations_total: Family<MutationLabels, Counter>,
    pub replicas_desired: Family<WorkloadLabels, Gauge>,
    pub replicas_ready: Family<WorkloadLabels, Gauge>,
    /// Unix seconds of the last pass that finished without error
    pub last_reconcile_timestamp_seconds: Gauge,
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reconciliations_total = Family::<WorkloadLabels, Counter>::default();
        registry.register(
            "statefulworkload_reconciliations",
            "Total number of reconciliations",
            reconciliations_total.clone(),
        );

        let reconciliation_errors_total = Family::<WorkloadLabels, Counter>::default();
        registry.register(
            "statefulworkload_reconciliation_errors",
            "Total number of reconciliation errors",
            reconciliation_errors_total.clone(),
        );

        let reconcile_duration_seconds =
            Family::<WorkloadLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "statefulworkload_reconcile_duration_seconds",
            "Duration of reconciliation in seconds",
            reconcile_duration_seconds.clone(),
        );

        let pod_mutations_total = Family::<MutationLabels, Counter>::default();
        registry.register(
            "statefulworkload_pod_mutations",
            "Total number of pod creations, deletions and replacements",
            pod_mutations_total.clone(),
        );

        let replicas_desired = Family::<WorkloadLabels, Gauge>::default();
        registry.register(
            "statefulworkload_replicas_desired",
            "spec.replicas of each workload",
            replicas_desired.clone(),
        );

        let replicas_ready = Family::<WorkloadLabels, Gauge>::default();
        registry.register(
            "statefulworkload_replicas_ready",
            "status.readyReplicas of each workload",
            replicas_ready.clone(),
        );

        let last_reconcile_timestamp_seconds = Gauge::default();
        registry.register(
            "statefulworkload_last_reconcile_timestamp_seconds",
            "Unix time of the last successful reconciliation pass",
            last_reconcile_timestamp_seconds.clone(),
        );

        Self {
            reconciliations_total,
            reconciliation_errors_total,
            reconcile_duration_seconds,
            pod_mutations_total,
            replicas_desired,
            replicas_ready,
            last_reconcile_timestamp_seconds,
            registry,
        }
    }

    /// Count a successful pass and stamp it with `finished_at` (Unix seconds).
    pub fn record_reconcile(&self, namespace: &str, name: &str, duration_secs: f64, finished_at: i64) {
        let labels = WorkloadLabels::new(namespace, name);
        self.reconciliations_total.get_or_create(&labels).inc();
        self.reconcile_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
        self.last_reconcile_timestamp_seconds.set(finished_at);
    }

    pub fn record_error(&self, namespace: &str, name: &str) {
        let labels = WorkloadLabels::new(namespace, name);
        self.reconciliation_errors_total
            .get_or_create(&labels)
            .inc();
    }

    /// Count a pod mutation by action (`create`, `delete`, `replace`)
    pub fn record_pod_mutation(&self, action: &str) {
        let labels = MutationLabels {
            action: action.to_string(),
        };
        self.pod_mutations_total.get_or_create(&labels).inc();
    }

    /// Publish desired and ready replica counts for a workload
    pub fn set_replicas(&self, namespace: &str, name: &str, desired: i64, ready: i64) {
        let labels = WorkloadLabels::new(namespace, name);
        self.replicas_desired.get_or_create(&labels).set(desired);
        self.replicas_ready.get_or_create(&labels).set(ready);
    }

    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Readiness flag and metrics shared by the controller and the HTTP server
pub struct HealthState {
    ready: RwLock<bool>,
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Starts not ready; `run_controller` flips it on.
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// 503 before the controller starts and during shutdown.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve the probe and metrics router on `0.0.0.0:port`.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
