//! Error types for the promotion workflow

use std::time::Duration;

use thiserror::Error;

use super::control_plane::ControlPlaneError;

/// Error variants are named with the `Error` suffix, matching the controller errors.
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum PromotionError {
    /// Required structure is missing; never retried
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// Fetch failed on a control plane while waiting or before patching
    #[error("Failed to fetch DocumentDB from {plane}: {source}")]
    FetchError {
        plane: String,
        #[source]
        source: ControlPlaneError,
    },

    /// The patch was rejected for a reason other than a version conflict
    #[error("Failed to patch DocumentDB on {plane}: {source}")]
    PatchError {
        plane: String,
        #[source]
        source: ControlPlaneError,
    },

    /// Optimistic-concurrency rejection that outlived the retry budget
    #[error("Conflicting update on {plane} after {attempts} attempts: {source}")]
    ConflictError {
        plane: String,
        attempts: u32,
        #[source]
        source: ControlPlaneError,
    },

    /// Deadline exceeded while still polling
    #[error("Timed out after {timeout:?} waiting for {target} to become the ready primary")]
    TimeoutError { timeout: Duration, target: String },

    /// The caller cancelled the wait
    #[error("Wait for promotion of {target} was cancelled")]
    CancelledError { target: String },
}

impl PromotionError {
    /// Check if the whole promotion may be retried from scratch
    pub fn is_retryable(&self) -> bool {
        match self {
            PromotionError::ConfigurationError(_) => false,
            PromotionError::FetchError { .. } => true,
            PromotionError::PatchError { .. } => false,
            PromotionError::ConflictError { .. } => true,
            PromotionError::TimeoutError { .. } => false,
            PromotionError::CancelledError { .. } => false,
        }
    }
}

pub type PromotionResult<T> = std::result::Result<T, PromotionError>;
