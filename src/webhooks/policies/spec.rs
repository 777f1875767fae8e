//! Declared spec policy
//!
//! Rejects at admission what the reconciler would reject later.

use super::{ValidationContext, ValidationResult};
use crate::controller::validate_spec;

pub fn validate_declared_spec(ctx: &ValidationContext) -> ValidationResult {
    match validate_spec(ctx.db) {
        Ok(()) => ValidationResult::allowed(),
        Err(e) => ValidationResult::denied("InvalidSpec", &e.to_string()),
    }
}
