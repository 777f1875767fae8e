//! Cross-cluster promotion
//!
//! `promote` submits a replication patch to the hub and then, unless told
//! not to, waits until the hub and a verification member both report the
//! new primary. Nothing is remembered between calls: every step works from
//! freshly fetched copies of the declaration.

pub mod control_plane;
pub mod error;
pub mod memory;
pub mod patch;
pub mod wait;

pub use control_plane::{ControlPlane, ControlPlaneError, KubeControlPlane};
pub use error::{PromotionError, PromotionResult};
pub use memory::InMemoryControlPlane;
pub use patch::{MAX_PATCH_ATTEMPTS, ReplicationPatch, apply_replication_patch, compute_patch};
pub use wait::{
    Convergence, PollState, WaitConfig, is_promotion_observed, parse_duration, poll_once,
    wait_for_convergence,
};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::crd::DocumentDB;

/// A request to make `target_primary` the primary of a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionRequest {
    pub name: String,
    pub namespace: String,
    pub target_primary: String,
    /// Return right after the patch is accepted
    pub skip_wait: bool,
    /// Drop the previous primary from the membership
    pub is_failover: bool,
    pub wait: WaitConfig,
}

impl PromotionRequest {
    pub fn new(name: impl Into<String>, target_primary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: "default".to_string(),
            target_primary: target_primary.into(),
            skip_wait: false,
            is_failover: false,
            wait: WaitConfig::default(),
        }
    }

    /// Check required fields before touching any control plane
    pub fn validate(&self) -> PromotionResult<()> {
        if self.name.is_empty() {
            return Err(PromotionError::ConfigurationError(
                "DocumentDB name is required".to_string(),
            ));
        }
        if self.target_primary.is_empty() {
            return Err(PromotionError::ConfigurationError(
                "target primary is required".to_string(),
            ));
        }
        if self.namespace.is_empty() {
            return Err(PromotionError::ConfigurationError(
                "namespace must not be empty".to_string(),
            ));
        }
        if !self.skip_wait && (self.wait.timeout.is_zero() || self.wait.poll_interval.is_zero()) {
            return Err(PromotionError::ConfigurationError(
                "wait timeout and poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// How a successful promotion ended
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionOutcome {
    /// The patch was accepted and waiting was skipped
    Submitted {
        patch: ReplicationPatch,
        declaration: Box<DocumentDB>,
    },
    /// The patch was accepted and every supplied control plane observed it
    Converged {
        patch: ReplicationPatch,
        declaration: Box<DocumentDB>,
        convergence: Convergence,
    },
}

impl PromotionOutcome {
    pub fn patch(&self) -> &ReplicationPatch {
        match self {
            PromotionOutcome::Submitted { patch, .. }
            | PromotionOutcome::Converged { patch, .. } => patch,
        }
    }

    /// The declaration as written by the patch
    pub fn declaration(&self) -> &DocumentDB {
        match self {
            PromotionOutcome::Submitted { declaration, .. }
            | PromotionOutcome::Converged { declaration, .. } => declaration,
        }
    }
}

/// Promote `request.target_primary` and optionally wait for convergence
#[instrument(
    skip(request, hub, secondary, cancel),
    fields(
        name = %request.name,
        namespace = %request.namespace,
        target = %request.target_primary,
        failover = request.is_failover
    )
)]
pub async fn promote(
    request: &PromotionRequest,
    hub: &dyn ControlPlane,
    secondary: Option<&dyn ControlPlane>,
    cancel: &CancellationToken,
) -> PromotionResult<PromotionOutcome> {
    request.validate()?;

    let (patch, declaration) = apply_replication_patch(
        hub,
        &request.namespace,
        &request.name,
        &request.target_primary,
        request.is_failover,
    )
    .await?;
    let declaration = Box::new(declaration);

    if request.skip_wait {
        info!("Promotion submitted, not waiting for convergence");
        return Ok(PromotionOutcome::Submitted { patch, declaration });
    }

    let convergence = wait_for_convergence(
        &request.target_primary,
        hub,
        secondary,
        &request.namespace,
        &request.name,
        &request.wait,
        cancel,
    )
    .await?;

    Ok(PromotionOutcome::Converged {
        patch,
        declaration,
        convergence,
    })
}
