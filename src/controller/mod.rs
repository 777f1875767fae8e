pub mod context;
pub mod error;
pub mod reconciler;
pub mod status;
pub mod validation;

pub use context::Context;
pub use error::{BackoffConfig, Error, Result};
pub use reconciler::{FINALIZER, error_policy, reconcile};
pub use status::{ConditionBuilder, Observation, StatusManager, observed_status, spec_changed};
pub use validation::{MAX_INSTANCES_PER_NODE, MIN_INSTANCES_PER_NODE, validate_spec};
