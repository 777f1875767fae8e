//! Reconciliation logic for DocumentDB resources
//!
//! Each pass resolves the bootstrap mode, builds the underlying cluster for
//! this member, applies it, and mirrors the cluster's state into the
//! DocumentDB status. Passes are level-triggered and may run any number of
//! times for the same input.

use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use crate::controller::context::Context;
use crate::controller::error::{BackoffConfig, Error, Result};
use crate::controller::status::{Observation, StatusManager, observed_status, spec_changed};
use crate::controller::validation::validate_spec;
use crate::crd::DocumentDB;
use crate::crd::cnpg::Cluster;
use crate::resources::recovery_claim::{claim_to_delete, generate_recovery_claim};
use crate::resources::{
    BuildFlags, ClusterIdentity, FIELD_MANAGER, ResolvedBootstrap, effective_bootstrap,
    generate_cluster, is_primary_region, resolve,
};

/// Finalizer name for cleanup
pub const FINALIZER: &str = "documentdb.io/finalizer";

/// Requeue interval once the underlying cluster is healthy
const STEADY_REQUEUE: Duration = Duration::from_secs(60);

/// Requeue interval while the underlying cluster converges
const CONVERGING_REQUEUE: Duration = Duration::from_secs(10);

/// Main reconciliation function
#[instrument(
    skip(db, ctx),
    fields(name = %db.name_any(), namespace = db.namespace().unwrap_or_default())
)]
pub async fn reconcile(db: Arc<DocumentDB>, ctx: Arc<Context>) -> Result<Action> {
    let started = Instant::now();
    let ns = db
        .namespace()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let name = db.name_any();

    if db.metadata.deletion_timestamp.is_some() {
        return handle_deletion(&db, &ctx, &ns).await;
    }

    if !has_finalizer(&db) {
        add_finalizer(&db, &ctx, &ns).await?;
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    if spec_changed(&db) {
        info!(
            generation = ?db.metadata.generation,
            observed = ?db.status.as_ref().and_then(|s| s.observed_generation),
            "Spec changed, reconciling"
        );
    }

    let result = match validate_spec(&db) {
        Ok(()) => reconcile_documentdb(&db, &ctx, &ns).await,
        Err(e) => {
            let status_manager = StatusManager::new(&db, &ctx, &ns);
            let _ = status_manager
                .set_failed("ValidationFailed", &e.to_string())
                .await;
            Err(e)
        }
    };

    match result {
        Ok(action) => {
            if let Some(state) = ctx.health_state.as_ref() {
                state
                    .metrics
                    .record_reconcile(&ns, &name, started.elapsed().as_secs_f64());
                state.mark_reconciled();
            }
            debug!("Reconciliation completed");
            Ok(action)
        }
        Err(e) => {
            error!("Reconciliation failed: {}", e);
            if !matches!(e, Error::ValidationError(_)) {
                let status_manager = StatusManager::new(&db, &ctx, &ns);
                let _ = status_manager
                    .set_failed("ReconciliationFailed", &e.to_string())
                    .await;
            }
            Err(e)
        }
    }
}

/// Error policy for the controller with exponential backoff
pub fn error_policy(db: Arc<DocumentDB>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = db.name_any();
    let ns = db.namespace().unwrap_or_default();
    let backoff = BackoffConfig::default();

    if let Some(state) = ctx.health_state.as_ref() {
        state.metrics.record_error(&ns, &name);
    }

    let delay = backoff.delay_for_error(error, 0);

    if error.is_retryable() {
        warn!(%name, ?delay, "Retryable error: {:?}", error);
    } else {
        error!(%name, ?delay, "Non-retryable error, waiting for a spec change: {:?}", error);
    }

    Action::requeue(delay)
}

/// Bring the underlying cluster for this member in line with the declaration
async fn reconcile_documentdb(db: &DocumentDB, ctx: &Context, ns: &str) -> Result<Action> {
    let member = ctx.config.member_cluster_name.as_str();
    let primary_region = is_primary_region(db, member);
    let identity = ClusterIdentity::for_member(db, member);

    let clusters: Api<Cluster> = Api::namespaced(ctx.client.clone(), ns);
    let existing = clusters.get_opt(&identity.name).await?;

    let resolved = resolve(db, primary_region);
    let storage_class = db
        .spec
        .resource
        .storage
        .storage_class
        .clone()
        .unwrap_or_default();
    let flags = BuildFlags {
        is_primary_region: primary_region,
        member_name: member.to_string(),
        gateway_sidecar: ctx.config.gateway_sidecar,
    };

    let mut desired = generate_cluster(
        &identity,
        db,
        &resolved,
        &storage_class,
        &ctx.config.images(),
        &flags,
    );

    desired.spec.bootstrap = effective_bootstrap(existing.as_ref(), &resolved);
    let created_mode = match existing.as_ref() {
        Some(_) => None,
        None => {
            info!(cluster = %identity.name, bootstrap = %resolved, "Creating underlying cluster");
            if let Some((claim_name, volume_name)) = resolved.recovery_claim() {
                let claim = generate_recovery_claim(db, claim_name, volume_name);
                apply_resource(ctx, ns, &claim).await?;
            }
            Some(resolved.mode().to_string())
        }
    };

    let applied = apply_resource(ctx, ns, &desired).await?;

    let observation = Observation {
        bootstrap_mode: created_mode.clone(),
        is_primary_region: primary_region,
        member_name: member.to_string(),
        cluster_name: identity.name.clone(),
        ..Observation::from_cluster(Some(&applied))
    };

    if observation.is_healthy() {
        cleanup_recovery_claim(&resolved, ctx, ns).await?;
    }

    if let Some(state) = ctx.health_state.as_ref() {
        if let Some(mode) = created_mode.as_deref() {
            state.metrics.record_bootstrap(mode);
        }
        state.metrics.set_topology(
            ns,
            &db.name_any(),
            i64::from(db.spec.instances_per_node),
            i64::from(observation.ready_instances),
            primary_region,
        );
    }

    let status = observed_status(db, &observation);
    if db.status.as_ref() != Some(&status) {
        StatusManager::new(db, ctx, ns).update(status).await?;
    }

    if observation.is_healthy() {
        Ok(Action::requeue(STEADY_REQUEUE))
    } else {
        Ok(Action::requeue(CONVERGING_REQUEUE))
    }
}

/// Delete the temporary recovery claim once it is no longer needed
async fn cleanup_recovery_claim(
    resolved: &ResolvedBootstrap,
    ctx: &Context,
    ns: &str,
) -> Result<()> {
    let Some((claim_name, _)) = resolved.recovery_claim() else {
        return Ok(());
    };

    let api: Api<PersistentVolumeClaim> = Api::namespaced(ctx.client.clone(), ns);
    let existing = api.get_opt(claim_name).await?;
    let Some(claim_name) = claim_to_delete(resolved, existing.as_ref()) else {
        return Ok(());
    };

    match api.delete(claim_name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(claim = claim_name, "Deleted temporary recovery claim");
            Ok(())
        }
        Err(kube::Error::Api(status)) if status.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Apply a Kubernetes resource using server-side apply
async fn apply_resource<T>(ctx: &Context, ns: &str, resource: &T) -> Result<T>
where
    T: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
        + serde::Serialize
        + DeserializeOwned
        + Clone
        + std::fmt::Debug,
    <T as kube::Resource>::DynamicType: Default,
{
    let api: Api<T> = Api::namespaced(ctx.client.clone(), ns);
    let name = resource.name_any();

    let patch = Patch::Apply(resource);
    let params = PatchParams::apply(FIELD_MANAGER).force();

    let applied = api.patch(&name, &params, &patch).await?;
    debug!("Applied resource: {}", name);

    Ok(applied)
}

/// Check if the finalizer is present
fn has_finalizer(db: &DocumentDB) -> bool {
    db.metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == FINALIZER))
}

/// Add the finalizer to the resource
async fn add_finalizer(db: &DocumentDB, ctx: &Context, ns: &str) -> Result<()> {
    let api: Api<DocumentDB> = Api::namespaced(ctx.client.clone(), ns);
    let name = db.name_any();

    let mut finalizers = db.metadata.finalizers.clone().unwrap_or_default();
    finalizers.push(FINALIZER.to_string());
    let patch = serde_json::json!({
        "metadata": {
            "finalizers": finalizers
        }
    });

    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;

    info!("Added finalizer to {}", name);
    Ok(())
}

/// Handle deletion of the DocumentDB
///
/// Owned resources are garbage collected through owner references; only the
/// finalizer needs removing.
async fn handle_deletion(db: &DocumentDB, ctx: &Context, ns: &str) -> Result<Action> {
    let name = db.name_any();
    info!("Handling deletion of {}", name);

    if has_finalizer(db) {
        let api: Api<DocumentDB> = Api::namespaced(ctx.client.clone(), ns);

        let remaining: Vec<String> = db
            .metadata
            .finalizers
            .iter()
            .flatten()
            .filter(|f| f.as_str() != FINALIZER)
            .cloned()
            .collect();
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": remaining
            }
        });

        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        info!("Removed finalizer from {}", name);
    }

    Ok(Action::await_change())
}
