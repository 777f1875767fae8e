//! Validation of DocumentDB specs
//!
//! Runs at the start of every reconciliation and from the admission webhook.

use std::collections::BTreeSet;

use crate::controller::error::{Error, Result};
use crate::crd::DocumentDB;

/// Only single-node deployments are supported
pub const SUPPORTED_NODE_COUNT: i32 = 1;

pub const MIN_INSTANCES_PER_NODE: i32 = 1;
pub const MAX_INSTANCES_PER_NODE: i32 = 3;

/// Validate the declaration
pub fn validate_spec(db: &DocumentDB) -> Result<()> {
    validate_topology(db)?;
    validate_storage(db)?;
    validate_replication(db)?;
    Ok(())
}

fn validate_topology(db: &DocumentDB) -> Result<()> {
    if db.spec.node_count != SUPPORTED_NODE_COUNT {
        return Err(Error::ValidationError(format!(
            "nodeCount must be {}, got {}",
            SUPPORTED_NODE_COUNT, db.spec.node_count
        )));
    }

    let instances = db.spec.instances_per_node;
    if !(MIN_INSTANCES_PER_NODE..=MAX_INSTANCES_PER_NODE).contains(&instances) {
        return Err(Error::ValidationError(format!(
            "instancesPerNode must be between {} and {}, got {}",
            MIN_INSTANCES_PER_NODE, MAX_INSTANCES_PER_NODE, instances
        )));
    }

    Ok(())
}

/// Validate storage size (e.g. "10Gi")
fn validate_storage(db: &DocumentDB) -> Result<()> {
    let size = &db.spec.resource.storage.pvc_size;

    if !size.ends_with("Gi") && !size.ends_with("Mi") && !size.ends_with("Ti") {
        return Err(Error::ValidationError(format!(
            "pvcSize must end with Gi, Mi, or Ti: {}",
            size
        )));
    }

    let num_str = size.trim_end_matches(char::is_alphabetic);
    let num: u64 = num_str
        .parse()
        .map_err(|_| Error::ValidationError(format!("invalid pvcSize number: {}", size)))?;
    if num == 0 {
        return Err(Error::ValidationError(
            "pvcSize must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_replication(db: &DocumentDB) -> Result<()> {
    let Some(replication) = db.spec.cluster_replication.as_ref() else {
        return Ok(());
    };

    if replication.cluster_list.is_empty() {
        return Err(Error::ValidationError(
            "clusterReplication.clusterList must not be empty".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for member in &replication.cluster_list {
        if member.name.is_empty() {
            return Err(Error::ValidationError(
                "clusterReplication.clusterList entries must have a name".to_string(),
            ));
        }
        if !seen.insert(member.name.as_str()) {
            return Err(Error::ValidationError(format!(
                "duplicate member {} in clusterReplication.clusterList",
                member.name
            )));
        }
    }

    if !replication.primary.is_empty() && !replication.has_member(&replication.primary) {
        return Err(Error::ValidationError(format!(
            "clusterReplication.primary {} is not listed in clusterList",
            replication.primary
        )));
    }

    Ok(())
}
