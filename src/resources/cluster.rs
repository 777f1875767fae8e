//! Underlying CloudNativePG cluster generation
//!
//! `generate_cluster` is a pure function of its inputs. It runs on every
//! reconciliation, so two calls with the same inputs must serialize to the
//! same bytes: every map is a `BTreeMap` and list order follows the
//! declaration.

use std::collections::BTreeMap;

use kube::ResourceExt;
use kube::core::ObjectMeta;

use crate::crd::DocumentDB;
use crate::crd::cnpg::{
    AffinityConfiguration, Cluster, ClusterSpec, EmbeddedObjectMetadata, ExternalCluster,
    PluginConfiguration, PostgresConfiguration, ReplicaClusterConfiguration, StorageConfiguration,
};
use crate::resources::bootstrap::ResolvedBootstrap;
use crate::resources::common::{inherited_labels, owner_reference, standard_labels};

/// Stop delay used when the declaration does not override it
pub const DEFAULT_STOP_DELAY_SECS: i32 = 30;

/// Default DocumentDB image (PostgreSQL with the documentdb extension)
pub const DEFAULT_DOCUMENTDB_IMAGE: &str =
    "ghcr.io/microsoft/documentdb/documentdb-postgres:16-0.106.0";

/// Default gateway sidecar image
pub const DEFAULT_GATEWAY_IMAGE: &str = "ghcr.io/microsoft/documentdb/documentdb-gateway:0.106.0";

/// Plugin that injects the gateway sidecar into instance pods
pub const SIDECAR_PLUGIN_NAME: &str = "cnpg-i-sidecar-injector.documentdb.io";

/// Port of the read-write service of every member
const POSTGRES_PORT: &str = "5432";

/// Role used by standbys to stream from the primary
const STREAMING_USER: &str = "streaming_replica";

/// Name and namespace of the underlying cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub name: String,
    pub namespace: String,
}

impl ClusterIdentity {
    /// Identity of the underlying cluster for `db` inside `member_name`
    ///
    /// Replicated declarations name the cluster after the member so that
    /// every member can address the others; otherwise the declaration name
    /// is used.
    pub fn for_member(db: &DocumentDB, member_name: &str) -> Self {
        let name = match db.spec.cluster_replication.as_ref() {
            Some(replication) if replication.has_member(member_name) => member_name.to_string(),
            _ => db.name_any(),
        };
        Self {
            name,
            namespace: db.namespace().unwrap_or_else(|| "default".to_string()),
        }
    }
}

/// Images used when the declaration does not override them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub documentdb_image: String,
    pub gateway_image: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            documentdb_image: DEFAULT_DOCUMENTDB_IMAGE.to_string(),
            gateway_image: DEFAULT_GATEWAY_IMAGE.to_string(),
        }
    }
}

/// Per-reconciliation switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFlags {
    /// This reconciliation targets the member that is primary
    pub is_primary_region: bool,
    /// Member this operator runs in
    pub member_name: String,
    /// Attach the gateway sidecar plugin
    pub gateway_sidecar: bool,
}

/// Translate a storage class name into the optional field
///
/// An empty name means "unset" so the platform default applies.
pub fn storage_class_from_name(storage_class_name: &str) -> Option<String> {
    if storage_class_name.is_empty() {
        None
    } else {
        Some(storage_class_name.to_string())
    }
}

/// Effective stop delay for a declaration
pub fn stop_delay(db: &DocumentDB) -> i32 {
    match db.spec.timeouts.as_ref() {
        Some(t) if t.stop_delay > 0 => t.stop_delay,
        _ => DEFAULT_STOP_DELAY_SECS,
    }
}

/// Generate the underlying cluster for a declaration
pub fn generate_cluster(
    identity: &ClusterIdentity,
    db: &DocumentDB,
    bootstrap: &ResolvedBootstrap,
    storage_class_name: &str,
    images: &ImageConfig,
    flags: &BuildFlags,
) -> Cluster {
    let db_name = db.name_any();

    let image_name = db
        .spec
        .document_db_image
        .clone()
        .unwrap_or_else(|| images.documentdb_image.clone());

    let high_availability = db
        .spec
        .cluster_replication
        .as_ref()
        .is_some_and(|r| r.high_availability);

    let (replica, external_clusters) = generate_topology(identity, db, flags);

    let plugins = if flags.gateway_sidecar {
        let gateway_image = db
            .spec
            .gateway_image
            .clone()
            .unwrap_or_else(|| images.gateway_image.clone());
        vec![PluginConfiguration {
            name: SIDECAR_PLUGIN_NAME.to_string(),
            enabled: true,
            parameters: BTreeMap::from([("gatewayImage".to_string(), gateway_image)]),
        }]
    } else {
        vec![]
    };

    Cluster {
        metadata: ObjectMeta {
            name: Some(identity.name.clone()),
            namespace: Some(identity.namespace.clone()),
            labels: Some(standard_labels(&db_name)),
            owner_references: Some(vec![owner_reference(db)]),
            ..Default::default()
        },
        spec: ClusterSpec {
            instances: db.spec.instances_per_node,
            image_name,
            postgresql: postgres_configuration(),
            storage: StorageConfiguration {
                size: db.spec.resource.storage.pvc_size.clone(),
                storage_class: storage_class_from_name(storage_class_name),
            },
            inherited_metadata: Some(EmbeddedObjectMetadata {
                labels: inherited_labels(&db_name, flags.is_primary_region),
            }),
            stop_delay: stop_delay(db),
            affinity: Some(AffinityConfiguration {
                enable_pod_anti_affinity: true,
                topology_key: "kubernetes.io/hostname".to_string(),
                pod_anti_affinity_type: if high_availability {
                    "required".to_string()
                } else {
                    "preferred".to_string()
                },
            }),
            bootstrap: Some(bootstrap.to_cluster_bootstrap()),
            replica,
            external_clusters,
            plugins,
        },
        status: None,
    }
}

fn postgres_configuration() -> PostgresConfiguration {
    PostgresConfiguration {
        shared_preload_libraries: vec![
            "pg_cron".to_string(),
            "pg_documentdb_core".to_string(),
            "pg_documentdb".to_string(),
        ],
        parameters: BTreeMap::from([
            ("cron.database_name".to_string(), "postgres".to_string()),
            ("max_replication_slots".to_string(), "10".to_string()),
            ("max_wal_senders".to_string(), "10".to_string()),
        ]),
    }
}

/// Replica section and external clusters for a replicated declaration
fn generate_topology(
    identity: &ClusterIdentity,
    db: &DocumentDB,
    flags: &BuildFlags,
) -> (Option<ReplicaClusterConfiguration>, Vec<ExternalCluster>) {
    let Some(replication) = db.spec.cluster_replication.as_ref() else {
        return (None, vec![]);
    };
    if !replication.has_member(&flags.member_name) {
        return (None, vec![]);
    }

    let external_clusters = replication
        .cluster_list
        .iter()
        .map(|member| ExternalCluster {
            name: member.name.clone(),
            connection_parameters: BTreeMap::from([
                (
                    "host".to_string(),
                    format!("{}-rw.{}.svc", member.name, identity.namespace),
                ),
                ("port".to_string(), POSTGRES_PORT.to_string()),
                ("dbname".to_string(), "postgres".to_string()),
                ("user".to_string(), STREAMING_USER.to_string()),
            ]),
        })
        .collect();

    let replica = ReplicaClusterConfiguration {
        primary: replication.primary.clone(),
        source: replication.primary.clone(),
        self_: flags.member_name.clone(),
    };

    (Some(replica), external_clusters)
}
