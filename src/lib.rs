pub mod config;
pub mod controller;
pub mod crd;
pub mod health;
pub mod promotion;
pub mod resources;
pub mod webhooks;

pub use config::OperatorConfig;
pub use controller::{BackoffConfig, Context, Error, FINALIZER, Result, error_policy, reconcile};
pub use crd::DocumentDB;
pub use health::{HealthState, Metrics};
pub use promotion::{PromotionError, PromotionOutcome, PromotionRequest, promote};

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::runtime::Controller;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;

use crate::crd::cnpg::Cluster;

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Run the DocumentDB controller (cluster-wide).
///
/// If health_state is provided, metrics will be recorded for reconciliations.
pub async fn run_controller(
    client: Client,
    config: OperatorConfig,
    health_state: Option<Arc<HealthState>>,
) {
    run_controller_scoped(client, config, health_state, None).await
}

/// Run the DocumentDB controller with optional namespace scoping.
///
/// When `namespace` is `Some(ns)`, only watches resources in that namespace.
/// Changes to owned underlying clusters and recovery claims trigger
/// reconciliation of their DocumentDB.
pub async fn run_controller_scoped(
    client: Client,
    config: OperatorConfig,
    health_state: Option<Arc<HealthState>>,
    namespace: Option<&str>,
) {
    let scope_msg = namespace.unwrap_or("cluster-wide");
    tracing::info!(
        member = %config.member_cluster_name,
        "Starting controller for DocumentDB resources (scope: {})",
        scope_msg
    );

    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let ctx = Arc::new(Context::new(client.clone(), config, health_state));

    let documentdbs: Api<DocumentDB> = scoped_api(client.clone(), namespace);
    let clusters: Api<Cluster> = scoped_api(client.clone(), namespace);
    let claims: Api<PersistentVolumeClaim> = scoped_api(client.clone(), namespace);

    let watcher_config = WatcherConfig::default().any_semantic();

    Controller::new(documentdbs, watcher_config.clone())
        .owns(clusters, watcher_config.clone())
        .owns(claims, watcher_config)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    tracing::debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // Watch events for owned objects can outlive their DocumentDB
                    let is_not_found = matches!(
                        &e,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _)
                            if err.is_not_found()
                    );
                    if is_not_found {
                        tracing::debug!("Object no longer exists (likely deleted): {:?}", e);
                    } else {
                        tracing::error!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    tracing::error!("Controller stream ended unexpectedly");
}
