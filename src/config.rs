//! Operator configuration
//!
//! Every setting can come from a flag or from the environment, which is how
//! the operator Deployment passes them.

use clap::Parser;

use crate::resources::ImageConfig;
use crate::resources::cluster::{DEFAULT_DOCUMENTDB_IMAGE, DEFAULT_GATEWAY_IMAGE};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Kubernetes operator for DocumentDB", long_about = None)]
pub struct OperatorConfig {
    /// Name of the member cluster this operator runs in
    ///
    /// Compared against `clusterReplication.primary` to decide whether this
    /// member is the primary region.
    #[arg(long, env = "MEMBER_CLUSTER_NAME", default_value = "")]
    pub member_cluster_name: String,

    /// Restrict the controller to one namespace (cluster-wide when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// DocumentDB image used when a declaration does not override it
    #[arg(long, env = "DOCUMENTDB_IMAGE", default_value = DEFAULT_DOCUMENTDB_IMAGE)]
    pub documentdb_image: String,

    /// Gateway sidecar image used when a declaration does not override it
    #[arg(long, env = "GATEWAY_IMAGE", default_value = DEFAULT_GATEWAY_IMAGE)]
    pub gateway_image: String,

    /// Attach the gateway sidecar plugin to generated clusters
    #[arg(
        long,
        env = "ENABLE_GATEWAY_SIDECAR",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub gateway_sidecar: bool,

    /// Namespace holding the leader election lease
    #[arg(long, env = "POD_NAMESPACE", default_value = "documentdb-operator")]
    pub lease_namespace: String,

    /// Leader election lease name
    #[arg(long, env = "LEASE_NAME", default_value = "documentdb-operator-leader")]
    pub lease_name: String,
}

impl OperatorConfig {
    pub fn images(&self) -> ImageConfig {
        ImageConfig {
            documentdb_image: self.documentdb_image.clone(),
            gateway_image: self.gateway_image.clone(),
        }
    }
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            member_cluster_name: String::new(),
            watch_namespace: None,
            documentdb_image: DEFAULT_DOCUMENTDB_IMAGE.to_string(),
            gateway_image: DEFAULT_GATEWAY_IMAGE.to_string(),
            gateway_sidecar: true,
            lease_namespace: "documentdb-operator".to_string(),
            lease_name: "documentdb-operator-leader".to_string(),
        }
    }
}
