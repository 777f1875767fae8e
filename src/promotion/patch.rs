//! Replication patch computation and submission
//!
//! A promotion rewrites `spec.clusterReplication` in one merge patch:
//!
//! - ordinary promotion sets `primary` and leaves `clusterList` alone
//! - failover also drops the previous primary from `clusterList`
//!
//! The previous primary is always read from a freshly fetched copy of the
//! declaration, and the patch carries that copy's `resourceVersion`. If
//! another writer got there first the write is rejected and the whole
//! computation is redone against a new fetch.

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::crd::{DocumentDB, MemberCluster};

use super::control_plane::ControlPlane;
use super::error::{PromotionError, PromotionResult};

/// Attempts made before a version conflict is surfaced to the caller
pub const MAX_PATCH_ATTEMPTS: u32 = 3;

/// The change a promotion makes to a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationPatch {
    /// Primary read from the pre-image
    pub previous_primary: String,
    /// Primary being written
    pub primary: String,
    /// New membership, present only when it changes
    pub cluster_list: Option<Vec<MemberCluster>>,
    /// Version of the pre-image the patch was computed from
    pub resource_version: Option<String>,
}

impl ReplicationPatch {
    /// Whether the patch rewrites membership
    pub fn changes_membership(&self) -> bool {
        self.cluster_list.is_some()
    }

    /// Render as a JSON merge patch
    ///
    /// Merge patches replace arrays wholesale, so the primary and the
    /// membership land in the same write.
    pub fn to_merge_patch(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut replication = serde_json::Map::new();
        replication.insert("primary".to_string(), json!(self.primary));
        if let Some(list) = &self.cluster_list {
            replication.insert("clusterList".to_string(), serde_json::to_value(list)?);
        }

        let mut patch = json!({
            "spec": {
                "clusterReplication": replication
            }
        });
        if let Some(version) = &self.resource_version {
            patch["metadata"] = json!({ "resourceVersion": version });
        }
        Ok(patch)
    }
}

/// Compute the replication patch for `target` against a live declaration
///
/// Fails with `ConfigurationError` when the declaration has no replication
/// block, before anything is written.
pub fn compute_patch(
    live: &DocumentDB,
    target: &str,
    is_failover: bool,
) -> PromotionResult<ReplicationPatch> {
    let replication = live
        .spec
        .cluster_replication
        .as_ref()
        .filter(|r| !r.primary.is_empty() || !r.cluster_list.is_empty())
        .ok_or_else(|| {
            PromotionError::ConfigurationError(
                "clusterReplication is not configured on this DocumentDB".to_string(),
            )
        })?;

    let previous_primary = replication.primary.clone();

    let cluster_list = if is_failover
        && !previous_primary.is_empty()
        && previous_primary != target
        && replication.has_member(&previous_primary)
    {
        Some(
            replication
                .cluster_list
                .iter()
                .filter(|m| m.name != previous_primary)
                .cloned()
                .collect(),
        )
    } else {
        None
    };

    Ok(ReplicationPatch {
        previous_primary,
        primary: target.to_string(),
        cluster_list,
        resource_version: live.metadata.resource_version.clone(),
    })
}

/// Fetch the declaration, compute the patch, and submit it
///
/// Version conflicts restart from a fresh fetch, up to `MAX_PATCH_ATTEMPTS`.
/// Returns the submitted patch and the declaration as written.
#[instrument(skip(plane), fields(plane = %plane.name()))]
pub async fn apply_replication_patch(
    plane: &dyn ControlPlane,
    namespace: &str,
    name: &str,
    target: &str,
    is_failover: bool,
) -> PromotionResult<(ReplicationPatch, DocumentDB)> {
    let mut attempt = 0;
    loop {
        attempt += 1;

        let live = plane
            .get(namespace, name)
            .await
            .map_err(|source| PromotionError::FetchError {
                plane: plane.name().to_string(),
                source,
            })?;

        let patch = compute_patch(&live, target, is_failover)?;

        if let Some(replication) = live.spec.cluster_replication.as_ref()
            && !replication.has_member(target)
        {
            warn!(
                target,
                "Target primary is not listed in clusterReplication.clusterList"
            );
        }

        let body = patch
            .to_merge_patch()
            .map_err(|e| PromotionError::PatchError {
                plane: plane.name().to_string(),
                source: e.into(),
            })?;

        debug!(attempt, patch = %body, "Submitting replication patch");

        match plane.merge_patch(namespace, name, &body).await {
            Ok(updated) => {
                info!(
                    previous_primary = %patch.previous_primary,
                    primary = %patch.primary,
                    membership_changed = patch.changes_membership(),
                    "Replication patch applied"
                );
                return Ok((patch, updated));
            }
            Err(source) if source.is_conflict() => {
                if attempt >= MAX_PATCH_ATTEMPTS {
                    return Err(PromotionError::ConflictError {
                        plane: plane.name().to_string(),
                        attempts: attempt,
                        source,
                    });
                }
                warn!(attempt, "Version conflict, recomputing patch from a fresh copy");
            }
            Err(source) => {
                return Err(PromotionError::PatchError {
                    plane: plane.name().to_string(),
                    source,
                });
            }
        }
    }
}
