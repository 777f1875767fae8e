//! Temporary claim used to recover from a retained persistent volume
//!
//! The claim binds statically to the named volume: `volumeName` is set and
//! the storage class is the explicit empty string, which disables dynamic
//! provisioning. It is deleted once the recovered cluster is healthy.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use kube::core::ObjectMeta;

use crate::crd::DocumentDB;
use crate::resources::bootstrap::ResolvedBootstrap;
use crate::resources::common::{owner_reference, standard_labels};

/// Generate the claim `claim_name` bound to `volume_name`
pub fn generate_recovery_claim(
    db: &DocumentDB,
    claim_name: &str,
    volume_name: &str,
) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(claim_name.to_string()),
            namespace: db.namespace(),
            labels: Some(standard_labels(&db.name_any())),
            owner_references: Some(vec![owner_reference(db)]),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: Some(String::new()),
            volume_name: Some(volume_name.to_string()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(db.spec.resource.storage.pvc_size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    }
}

/// Name of the recovery claim still to delete, if any
///
/// Only a claim that exists and is not already terminating is returned.
pub fn claim_to_delete<'a>(
    resolved: &'a ResolvedBootstrap,
    existing: Option<&PersistentVolumeClaim>,
) -> Option<&'a str> {
    let (claim_name, _) = resolved.recovery_claim()?;
    let claim = existing?;
    if claim.name_any() != claim_name || claim.metadata.deletion_timestamp.is_some() {
        return None;
    }
    Some(claim_name)
}
