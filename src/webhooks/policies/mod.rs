//! Admission webhook policies
//!
//! Each policy module exports a `validate` function that checks specific rules.

pub mod immutability;
pub mod replication;
pub mod spec;

pub use immutability::{validate_recovery_immutability, validate_storage_immutability};
pub use replication::validate_replication_change;
pub use spec::validate_declared_spec;

use crate::crd::DocumentDB;

/// Result of a policy validation
#[derive(Debug)]
pub struct ValidationResult {
    pub allowed: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Context for validation including old object for UPDATE operations
pub struct ValidationContext<'a> {
    pub db: &'a DocumentDB,
    pub old_db: Option<&'a DocumentDB>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(db: &'a DocumentDB, old_db: Option<&'a DocumentDB>) -> Self {
        Self { db, old_db }
    }

    /// Check if this is a CREATE operation (no old object)
    pub fn is_create(&self) -> bool {
        self.old_db.is_none()
    }
}

/// Run all validation policies and return the first failure
pub fn validate_all(ctx: &ValidationContext) -> ValidationResult {
    let policies: [fn(&ValidationContext) -> ValidationResult; 4] = [
        validate_declared_spec,
        validate_replication_change,
        validate_recovery_immutability,
        validate_storage_immutability,
    ];

    for policy in policies {
        let result = policy(ctx);
        if !result.allowed {
            return result;
        }
    }

    ValidationResult::allowed()
}
