use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// DocumentDB is the Schema for the documentdbs API
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[kube(
    group = "documentdb.io",
    version = "preview",
    kind = "DocumentDB",
    plural = "documentdbs",
    shortname = "ddb",
    namespaced,
    status = "DocumentDBStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Instances", "type":"integer", "jsonPath":".spec.instancesPerNode"}"#,
    printcolumn = r#"{"name":"Primary", "type":"string", "jsonPath":".spec.clusterReplication.primary"}"#,
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.status"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDBSpec {
    /// Number of nodes in the cluster (only 1 is supported)
    #[serde(default = "default_one")]
    pub node_count: i32,

    /// Number of database instances per node
    /// - 1 = primary only
    /// - 2-3 = primary plus streaming standbys
    #[serde(default = "default_one")]
    pub instances_per_node: i32,

    /// Override for the DocumentDB (PostgreSQL + extension) image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_db_image: Option<String>,

    /// Override for the gateway sidecar image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_image: Option<String>,

    /// Storage and compute configuration
    pub resource: ResourceSpec,

    /// Cloud environment hint (e.g., "aks", "eks", "gke")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Lifecycle timeouts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<Timeouts>,

    /// How the cluster is initialized the first time it is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapSpec>,

    /// Multi-region replication topology
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_replication: Option<ClusterReplication>,
}

fn default_one() -> i32 {
    1
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub storage: StorageSpec,
}

/// Storage configuration for database data volumes
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Size of the persistent volume claim (e.g., "10Gi")
    pub pvc_size: String,

    /// Storage class name (platform default if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    /// Seconds to wait for instances to shut down (0 uses the platform default)
    #[serde(default)]
    pub stop_delay: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoverySpec>,
}

/// Recovery source for a new cluster. When both are set the volume wins.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RecoverySpec {
    /// Recover from a named backup artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<NamedReference>,

    /// Recover from a retained persistent volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume: Option<NamedReference>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Default)]
pub struct NamedReference {
    #[serde(default)]
    pub name: String,
}

/// Replication topology across member clusters
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReplication {
    /// Member currently accepting writes
    #[serde(default)]
    pub primary: String,

    /// Participating members, in order
    #[serde(default)]
    pub cluster_list: Vec<MemberCluster>,

    /// Require instances to be spread across hosts
    #[serde(default)]
    pub high_availability: bool,
}

impl ClusterReplication {
    /// Whether the named member is part of the topology
    pub fn has_member(&self, name: &str) -> bool {
        self.cluster_list.iter().any(|m| m.name == name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemberCluster {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl MemberCluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            environment: None,
        }
    }
}

/// Status of the DocumentDB
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDBStatus {
    /// Phase reported by the underlying cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Instance currently acting as primary inside this member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_primary: Option<String>,

    /// Connection string for clients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// Bootstrap mode chosen when the cluster was first created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_mode: Option<String>,

    /// Observed generation of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Kubernetes-style conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Phase strings that count as healthy
pub const HEALTHY_PHASES: [&str; 2] = ["Ready", "Cluster in healthy state"];

/// Whether a phase string reports a healthy cluster
pub fn is_healthy_phase(phase: &str) -> bool {
    HEALTHY_PHASES.contains(&phase)
}

impl DocumentDB {
    /// Primary member named by the replication block, if any
    pub fn designated_primary(&self) -> Option<&str> {
        self.spec
            .cluster_replication
            .as_ref()
            .map(|r| r.primary.as_str())
            .filter(|p| !p.is_empty())
    }

    /// Phase reported in status, if any
    pub fn phase(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.status.as_deref())
            .filter(|p| !p.is_empty())
    }
}

/// Kubernetes-style condition
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition: True, False, or Unknown
    pub status: String,

    /// Reason for the condition's last transition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    pub last_transition_time: String,

    /// Generation observed when condition was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
