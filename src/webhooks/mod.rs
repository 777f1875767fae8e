//! Admission webhook for DocumentDB validation
//!
//! Rejects declarations the reconciler could not act on, and updates that
//! would change what is fixed at creation (storage class, recovery source)
//! or break the replication topology.

pub mod policies;
mod server;

pub use policies::{ValidationContext, ValidationResult, validate_all};
pub use server::{
    AdmissionReview, AdmissionReviewResponse, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
    WebhookError, run_webhook_server,
};
