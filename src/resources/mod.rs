pub mod bootstrap;
pub mod cluster;
pub mod common;
pub mod recovery_claim;

pub use bootstrap::{
    ResolvedBootstrap, effective_bootstrap, is_primary_region, recovery_claim_name, resolve,
};
pub use cluster::{BuildFlags, ClusterIdentity, ImageConfig, generate_cluster};
pub use common::{API_VERSION, FIELD_MANAGER, KIND, owner_reference, standard_labels};
