//! Replication topology policy
//!
//! On UPDATE:
//! - the replication block cannot be removed once configured
//! - the current primary cannot leave `clusterList` unless `primary` moves
//!   to another member in the same update (failover substitution)

use super::{ValidationContext, ValidationResult};

pub fn validate_replication_change(ctx: &ValidationContext) -> ValidationResult {
    let Some(old_db) = ctx.old_db else {
        return ValidationResult::allowed();
    };
    let Some(old) = old_db.spec.cluster_replication.as_ref() else {
        return ValidationResult::allowed();
    };
    let Some(new) = ctx.db.spec.cluster_replication.as_ref() else {
        return ValidationResult::denied(
            "ReplicationRemoved",
            "clusterReplication cannot be removed once configured. Underlying clusters are named after their members.",
        );
    };

    let primary_dropped = !old.primary.is_empty()
        && old.has_member(&old.primary)
        && !new.has_member(&old.primary);

    if primary_dropped && new.primary == old.primary {
        return ValidationResult::denied(
            "PrimaryRemoved",
            &format!(
                "Member {} is the current primary and cannot be removed from clusterList. Promote another member first, or fail over to it.",
                old.primary
            ),
        );
    }

    ValidationResult::allowed()
}
