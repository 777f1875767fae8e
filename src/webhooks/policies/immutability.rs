//! Immutability policies
//!
//! - Storage class cannot be changed after creation
//! - `bootstrap.recovery` cannot be changed after creation; recovery runs
//!   once, when the underlying cluster is first created

use super::{ValidationContext, ValidationResult};

/// Storage class cannot be changed after creation
pub fn validate_storage_immutability(ctx: &ValidationContext) -> ValidationResult {
    let Some(old_db) = ctx.old_db else {
        return ValidationResult::allowed();
    };

    let old_storage_class = &old_db.spec.resource.storage.storage_class;
    let new_storage_class = &ctx.db.spec.resource.storage.storage_class;

    if old_storage_class != new_storage_class {
        return ValidationResult::denied(
            "StorageClassImmutable",
            "Storage class cannot be changed after creation. Delete and recreate the DocumentDB to use a different storage class.",
        );
    }

    ValidationResult::allowed()
}

/// Recovery sources cannot be changed after creation
pub fn validate_recovery_immutability(ctx: &ValidationContext) -> ValidationResult {
    let Some(old_db) = ctx.old_db else {
        return ValidationResult::allowed();
    };

    let old_recovery = old_db.spec.bootstrap.as_ref().and_then(|b| b.recovery.as_ref());
    let new_recovery = ctx.db.spec.bootstrap.as_ref().and_then(|b| b.recovery.as_ref());

    if old_recovery != new_recovery {
        return ValidationResult::denied(
            "RecoveryImmutable",
            "bootstrap.recovery cannot be changed after creation. Recovery only happens when the cluster is first created.",
        );
    }

    ValidationResult::allowed()
}
