//! Common utilities for Kubernetes resource generation
//!
//! This module provides shared functions and constants used across
//! all resource generators to ensure consistency and reduce duplication.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;

use crate::crd::DocumentDB;

/// API version for DocumentDB CRD
pub const API_VERSION: &str = "documentdb.io/preview";

/// Kind for DocumentDB CRD
pub const KIND: &str = "DocumentDB";

/// Operator field manager name for server-side apply
pub const FIELD_MANAGER: &str = "documentdb-operator";

/// Label carrying the owning DocumentDB name
pub const CLUSTER_LABEL: &str = "documentdb.io/cluster";

/// Label propagated to instance pods naming the application
pub const APP_LABEL: &str = "app";

/// Label propagated to instance pods naming the member's replication role
pub const REPLICA_TYPE_LABEL: &str = "replica_type";

/// Generate an owner reference for a DocumentDB
///
/// This ensures that all child resources are properly owned by the declaration
/// and will be garbage collected when it is deleted.
pub fn owner_reference(db: &DocumentDB) -> OwnerReference {
    OwnerReference {
        api_version: API_VERSION.to_string(),
        kind: KIND.to_string(),
        name: db.name_any(),
        uid: db.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Generate standard labels for all resources belonging to a DocumentDB
pub fn standard_labels(db_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), db_name.to_string()),
        (
            "app.kubernetes.io/component".to_string(),
            "documentdb".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
        (CLUSTER_LABEL.to_string(), db_name.to_string()),
    ])
}

/// Labels inherited by every instance pod of the underlying cluster
pub fn inherited_labels(db_name: &str, is_primary_region: bool) -> BTreeMap<String, String> {
    let role = if is_primary_region {
        "primary"
    } else {
        "replica"
    };
    BTreeMap::from([
        (APP_LABEL.to_string(), db_name.to_string()),
        (REPLICA_TYPE_LABEL.to_string(), role.to_string()),
    ])
}
