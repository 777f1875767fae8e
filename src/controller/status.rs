//! Status and conditions for DocumentDB resources
//!
//! The phase and local primary are mirrored from the underlying cluster.
//! `bootstrapMode` is written on the first pass that creates the cluster and
//! carried forward unchanged afterwards.

use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};

use crate::controller::Context;
use crate::controller::error::Result;
use crate::crd::cnpg::Cluster;
use crate::crd::{Condition, DocumentDB, DocumentDBStatus, is_healthy_phase};
use crate::resources::FIELD_MANAGER;

/// Standard condition types following Kubernetes conventions
pub mod condition_types {
    /// The underlying cluster reports a healthy phase
    pub const READY: &str = "Ready";
    /// The underlying cluster is being created or changed
    pub const PROGRESSING: &str = "Progressing";
    /// The declaration passed validation
    pub const CONFIG_VALID: &str = "ConfigurationValid";
    /// This member is the primary region
    pub const PRIMARY_REGION: &str = "PrimaryRegion";
}

/// Condition status values
pub mod condition_status {
    pub const TRUE: &str = "True";
    pub const FALSE: &str = "False";
}

/// Builder for creating and updating status conditions
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
    generation: Option<i64>,
}

impl ConditionBuilder {
    /// Create a new condition builder
    pub fn new(generation: Option<i64>) -> Self {
        Self {
            conditions: Vec::new(),
            generation,
        }
    }

    /// Create from existing conditions
    pub fn from_existing(existing: Vec<Condition>, generation: Option<i64>) -> Self {
        Self {
            conditions: existing,
            generation,
        }
    }

    /// Set a condition, updating if it exists or adding if it doesn't
    pub fn set_condition(mut self, type_: &str, status: &str, reason: &str, message: &str) -> Self {
        let now = Utc::now().to_rfc3339();

        // Find existing condition of this type
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status != status {
                existing.status = status.to_string();
                existing.reason = reason.to_string();
                existing.message = message.to_string();
                existing.last_transition_time = now;
                existing.observed_generation = self.generation;
            } else {
                existing.reason = reason.to_string();
                existing.message = message.to_string();
                existing.observed_generation = self.generation;
            }
        } else {
            self.conditions.push(Condition {
                type_: type_.to_string(),
                status: status.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: now,
                observed_generation: self.generation,
            });
        }
        self
    }

    /// Set the Ready condition
    pub fn ready(self, is_ready: bool, reason: &str, message: &str) -> Self {
        let status = if is_ready {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        };
        self.set_condition(condition_types::READY, status, reason, message)
    }

    /// Set the Progressing condition
    pub fn progressing(self, is_progressing: bool, reason: &str, message: &str) -> Self {
        let status = if is_progressing {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        };
        self.set_condition(condition_types::PROGRESSING, status, reason, message)
    }

    pub fn config_valid(self, is_valid: bool, reason: &str, message: &str) -> Self {
        let status = if is_valid {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        };
        self.set_condition(condition_types::CONFIG_VALID, status, reason, message)
    }

    pub fn primary_region(self, is_primary: bool, member: &str) -> Self {
        let (status, reason) = if is_primary {
            (condition_status::TRUE, "PrimaryMember")
        } else {
            (condition_status::FALSE, "ReplicaMember")
        };
        let message = format!("Reconciled in member {member:?}");
        self.set_condition(condition_types::PRIMARY_REGION, status, reason, &message)
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

/// What a reconciliation pass observed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    /// Phase reported by the underlying cluster
    pub phase: Option<String>,
    pub current_primary: Option<String>,
    pub ready_instances: i32,
    /// Mode resolved for a cluster created in this pass
    pub bootstrap_mode: Option<String>,
    pub is_primary_region: bool,
    pub member_name: String,
    /// Name of the underlying cluster
    pub cluster_name: String,
}

impl Observation {
    /// Read phase, primary, and ready instances from an underlying cluster
    pub fn from_cluster(cluster: Option<&Cluster>) -> Self {
        let status = cluster.and_then(|c| c.status.as_ref());
        Self {
            phase: status.and_then(|s| s.phase.clone()),
            current_primary: status.and_then(|s| s.current_primary.clone()),
            ready_instances: status.and_then(|s| s.ready_instances).unwrap_or(0),
            ..Default::default()
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.phase.as_deref().is_some_and(is_healthy_phase)
    }
}

/// Status manager for DocumentDB resources
pub struct StatusManager<'a> {
    db: &'a DocumentDB,
    ctx: &'a Context,
    ns: &'a str,
}

impl<'a> StatusManager<'a> {
    pub fn new(db: &'a DocumentDB, ctx: &'a Context, ns: &'a str) -> Self {
        Self { db, ctx, ns }
    }

    /// Merge-patch the status subresource
    pub async fn update(&self, status: DocumentDBStatus) -> Result<()> {
        let api: Api<DocumentDB> = Api::namespaced(self.ctx.client.clone(), self.ns);
        let name = self.db.name_any();

        let patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            &name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(())
    }

    /// Record a failed pass without touching mirrored fields
    pub async fn set_failed(&self, reason: &str, message: &str) -> Result<()> {
        let existing = self.db.status.clone().unwrap_or_default();
        let generation = self.db.metadata.generation;

        let mut builder = ConditionBuilder::from_existing(existing.conditions.clone(), generation)
            .ready(false, reason, message)
            .progressing(false, "Failed", message);
        if reason == "ValidationFailed" {
            builder = builder.config_valid(false, reason, message);
        }

        self.update(DocumentDBStatus {
            conditions: builder.build(),
            ..existing
        })
        .await
    }
}

/// Compute the status for an observation
///
/// A recorded bootstrap mode is never replaced.
pub fn observed_status(db: &DocumentDB, observation: &Observation) -> DocumentDBStatus {
    let existing = db.status.clone().unwrap_or_default();
    let generation = db.metadata.generation;

    let healthy = observation.is_healthy();
    let phase_message = observation
        .phase
        .clone()
        .unwrap_or_else(|| "Waiting for the underlying cluster".to_string());

    let conditions = ConditionBuilder::from_existing(existing.conditions.clone(), generation)
        .config_valid(true, "Valid", "Specification is valid")
        .ready(
            healthy,
            if healthy { "ClusterHealthy" } else { "ClusterNotReady" },
            &phase_message,
        )
        .progressing(
            !healthy,
            if healthy { "Stable" } else { "Reconciling" },
            &phase_message,
        )
        .primary_region(observation.is_primary_region, &observation.member_name)
        .build();

    let connection_string = observation
        .current_primary
        .as_ref()
        .map(|_| connection_string(&observation.cluster_name, db));

    DocumentDBStatus {
        status: observation.phase.clone().or(existing.status),
        local_primary: observation.current_primary.clone().or(existing.local_primary),
        connection_string: connection_string.or(existing.connection_string),
        bootstrap_mode: existing
            .bootstrap_mode
            .or_else(|| observation.bootstrap_mode.clone()),
        observed_generation: generation,
        conditions,
    }
}

/// Gateway port exposed on the read-write service
pub const GATEWAY_PORT: u16 = 10260;

/// Client connection string for the gateway behind `cluster_name`
pub fn connection_string(cluster_name: &str, db: &DocumentDB) -> String {
    format!(
        "mongodb://{}-rw.{}.svc:{}/?tls=true&tlsAllowInvalidCertificates=true",
        cluster_name,
        db.namespace().unwrap_or_else(|| "default".to_string()),
        GATEWAY_PORT
    )
}

/// Check if the spec has changed since the last observed generation
pub fn spec_changed(db: &DocumentDB) -> bool {
    let current_generation = db.metadata.generation;
    let observed_generation = db.status.as_ref().and_then(|s| s.observed_generation);

    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        _ => true,
    }
}
