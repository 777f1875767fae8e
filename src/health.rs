//! Health server for Kubernetes probes and Prometheus metrics
//!
//! - `/healthz`: liveness
//! - `/readyz`: readiness, true once the controller runs
//! - `/metrics`: Prometheus text format

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// Labels for metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReconcileLabels {
    pub namespace: String,
    pub name: String,
}

impl prometheus_client::encoding::EncodeLabelSet for ReconcileLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for bootstrap metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct BootstrapLabels {
    pub mode: String,
}

impl prometheus_client::encoding::EncodeLabelSet for BootstrapLabels {
    fn encode(
        &self,
        mut encoder: prometheus_client::encoding::LabelSetEncoder,
    ) -> Result<(), std::fmt::Error> {
        use prometheus_client::encoding::EncodeLabel;
        ("mode", self.mode.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics state
pub struct Metrics {
    pub reconciliations_total: Family<ReconcileLabels, Counter>,
    pub reconciliation_errors_total: Family<ReconcileLabels, Counter>,
    pub reconcile_duration_seconds: Family<ReconcileLabels, Histogram>,

    /// Underlying clusters created, by bootstrap mode
    pub bootstraps_total: Family<BootstrapLabels, Counter>,
    /// Instances requested per declaration
    pub instances_desired: Family<ReconcileLabels, Gauge>,
    /// Instances reported ready by the underlying cluster
    pub instances_ready: Family<ReconcileLabels, Gauge>,
    /// 1 when this member is the primary region for the declaration
    pub primary_region: Family<ReconcileLabels, Gauge>,

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

        let reconciliations_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "documentdb_operator_reconciliations",
            "Total number of reconciliations",
            reconciliations_total.clone(),
        );

        let reconciliation_errors_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "documentdb_operator_reconciliation_errors",
            "Total number of reconciliation errors",
            reconciliation_errors_total.clone(),
        );

        let reconcile_duration_seconds =
            Family::<ReconcileLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "documentdb_operator_reconcile_duration_seconds",
            "Duration of reconciliation in seconds",
            reconcile_duration_seconds.clone(),
        );

        let bootstraps_total = Family::<BootstrapLabels, Counter>::default();
        registry.register(
            "documentdb_operator_bootstraps",
            "Underlying clusters created, by bootstrap mode",
            bootstraps_total.clone(),
        );

        let instances_desired = Family::<ReconcileLabels, Gauge>::default();
        registry.register(
            "documentdb_operator_instances_desired",
            "Instances requested by each DocumentDB",
            instances_desired.clone(),
        );

        let instances_ready = Family::<ReconcileLabels, Gauge>::default();
        registry.register(
            "documentdb_operator_instances_ready",
            "Ready instances reported for each DocumentDB",
            instances_ready.clone(),
        );

        let primary_region = Family::<ReconcileLabels, Gauge>::default();
        registry.register(
            "documentdb_operator_primary_region",
            "Whether this member is the primary region for each DocumentDB",
            primary_region.clone(),
        );

        Self {
            reconciliations_total,
            reconciliation_errors_total,
            reconcile_duration_seconds,
            bootstraps_total,
            instances_desired,
            instances_ready,
            primary_region,
            registry,
        }
    }

    /// Record a successful reconciliation
    pub fn record_reconcile(&self, namespace: &str, name: &str, duration_secs: f64) {
        let labels = labels(namespace, name);
        self.reconciliations_total.get_or_create(&labels).inc();
        self.reconcile_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a failed reconciliation
    pub fn record_error(&self, namespace: &str, name: &str) {
        self.reconciliation_errors_total
            .get_or_create(&labels(namespace, name))
            .inc();
    }

    /// Record the creation of an underlying cluster
    pub fn record_bootstrap(&self, mode: &str) {
        self.bootstraps_total
            .get_or_create(&BootstrapLabels {
                mode: mode.to_string(),
            })
            .inc();
    }

    /// Update instance and region gauges for a declaration
    pub fn set_topology(
        &self,
        namespace: &str,
        name: &str,
        desired: i64,
        ready: i64,
        is_primary_region: bool,
    ) {
        let labels = labels(namespace, name);
        self.instances_desired.get_or_create(&labels).set(desired);
        self.instances_ready.get_or_create(&labels).set(ready);
        self.primary_region
            .get_or_create(&labels)
            .set(i64::from(is_primary_region));
    }

    /// Encode metrics to Prometheus text format
    ///
    /// Returns an empty string if encoding fails.
    fn encode(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        buffer
    }
}

fn labels(namespace: &str, name: &str) -> ReconcileLabels {
    ReconcileLabels {
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Set once the controller is running (and, with leader election, leading)
    pub ready: RwLock<bool>,
    pub metrics: Metrics,
    /// Unix seconds of the last successful reconcile
    pub last_reconcile: AtomicU64,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
            last_reconcile: AtomicU64::new(0),
        }
    }

    /// Mark the operator as ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the operator is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }

    pub fn mark_reconciled(&self) {
        self.last_reconcile
            .store(chrono::Utc::now().timestamp().max(0) as u64, Ordering::Relaxed);
    }
}

/// Liveness probe handler
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Returns 503 until the controller is running
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

async fn metrics(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Address the health server binds to
pub const HEALTH_ADDR: &str = "0.0.0.0:8080";

/// Run the health server on `HEALTH_ADDR`
pub async fn run_health_server(state: Arc<HealthState>) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let listener = TcpListener::bind(HEALTH_ADDR).await?;
    tracing::info!(addr = HEALTH_ADDR, "Health server listening");

    axum::serve(listener, app).await
}
