//! Test fixtures and builders for DocumentDB resources
//!
//! # Quick Start
//!
//! ```rust,ignore
//! let db = create_test_documentdb("my-db", "default");
//! let members = ["cluster-a", "cluster-b"];
//! let replicated = create_replicated_documentdb("my-db", "default", "cluster-a", &members);
//! ```
//!
//! For anything more involved use the builder:
//! ```rust,ignore
//! let db = DocumentDBBuilder::new("my-db", "default")
//!     .with_instances(3)
//!     .with_volume_recovery("pv-1")
//!     .with_phase("Cluster in healthy state")
//!     .build();
//! ```

use documentdb_operator::crd::cnpg::{Cluster, ClusterSpec, ClusterStatus, StorageConfiguration};
use documentdb_operator::crd::{
    BootstrapSpec, ClusterReplication, DocumentDB, DocumentDBSpec, DocumentDBStatus,
    MemberCluster, NamedReference, RecoverySpec, ResourceSpec, StorageSpec, Timeouts,
};
use kube::core::ObjectMeta;

// =============================================================================
// Convenience Functions
// =============================================================================

/// Single-instance declaration without replication or recovery
pub fn create_test_documentdb(name: &str, namespace: &str) -> DocumentDB {
    DocumentDBBuilder::new(name, namespace).build()
}

/// Declaration replicated across `members` with `primary` writable
pub fn create_replicated_documentdb(
    name: &str,
    namespace: &str,
    primary: &str,
    members: &[&str],
) -> DocumentDB {
    DocumentDBBuilder::new(name, namespace)
        .with_replication(primary, members)
        .build()
}

// =============================================================================
// DocumentDB Builder
// =============================================================================

/// Builder for DocumentDB test fixtures
pub struct DocumentDBBuilder {
    name: String,
    namespace: String,
    uid: Option<String>,
    generation: Option<i64>,
    instances_per_node: i32,
    node_count: i32,
    pvc_size: String,
    storage_class: Option<String>,
    stop_delay: Option<i32>,
    recovery: Option<RecoverySpec>,
    replication: Option<ClusterReplication>,
    status: Option<DocumentDBStatus>,
}

impl DocumentDBBuilder {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: Some("test-uid-12345".to_string()),
            generation: Some(1),
            instances_per_node: 1,
            node_count: 1,
            pvc_size: "10Gi".to_string(),
            storage_class: None,
            stop_delay: None,
            recovery: None,
            replication: None,
            status: None,
        }
    }

    pub fn with_instances(mut self, instances: i32) -> Self {
        self.instances_per_node = instances;
        self
    }

    pub fn with_node_count(mut self, nodes: i32) -> Self {
        self.node_count = nodes;
        self
    }

    pub fn with_storage(mut self, size: &str, class: Option<&str>) -> Self {
        self.pvc_size = size.to_string();
        self.storage_class = class.map(String::from);
        self
    }

    pub fn with_stop_delay(mut self, secs: i32) -> Self {
        self.stop_delay = Some(secs);
        self
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn with_volume_recovery(mut self, volume: &str) -> Self {
        self.recovery.get_or_insert_with(Default::default).persistent_volume =
            Some(NamedReference {
                name: volume.to_string(),
            });
        self
    }

    pub fn with_backup_recovery(mut self, backup: &str) -> Self {
        self.recovery.get_or_insert_with(Default::default).backup = Some(NamedReference {
            name: backup.to_string(),
        });
        self
    }

    pub fn with_replication(mut self, primary: &str, members: &[&str]) -> Self {
        self.replication = Some(ClusterReplication {
            primary: primary.to_string(),
            cluster_list: members.iter().map(|m| MemberCluster::new(*m)).collect(),
            high_availability: false,
        });
        self
    }

    pub fn with_high_availability(mut self) -> Self {
        if let Some(replication) = self.replication.as_mut() {
            replication.high_availability = true;
        }
        self
    }

    pub fn with_phase(mut self, phase: &str) -> Self {
        self.status.get_or_insert_with(Default::default).status = Some(phase.to_string());
        self
    }

    pub fn with_bootstrap_mode(mut self, mode: &str) -> Self {
        self.status.get_or_insert_with(Default::default).bootstrap_mode = Some(mode.to_string());
        self
    }

    pub fn with_observed_generation(mut self, generation: i64) -> Self {
        self.status
            .get_or_insert_with(Default::default)
            .observed_generation = Some(generation);
        self
    }

    pub fn build(self) -> DocumentDB {
        DocumentDB {
            metadata: ObjectMeta {
                name: Some(self.name),
                namespace: Some(self.namespace),
                uid: self.uid,
                generation: self.generation,
                ..Default::default()
            },
            spec: DocumentDBSpec {
                node_count: self.node_count,
                instances_per_node: self.instances_per_node,
                document_db_image: None,
                gateway_image: None,
                resource: ResourceSpec {
                    storage: StorageSpec {
                        pvc_size: self.pvc_size,
                        storage_class: self.storage_class,
                    },
                },
                environment: None,
                timeouts: self.stop_delay.map(|stop_delay| Timeouts { stop_delay }),
                bootstrap: self.recovery.map(|recovery| BootstrapSpec {
                    recovery: Some(recovery),
                }),
                cluster_replication: self.replication,
            },
            status: self.status,
        }
    }
}

// =============================================================================
// Underlying cluster fixtures
// =============================================================================

/// Underlying cluster reporting `phase` with `ready` instances
pub fn create_observed_cluster(name: &str, phase: &str, ready: i32) -> Cluster {
    let mut cluster = Cluster::new(
        name,
        ClusterSpec {
            instances: ready,
            image_name: "documentdb:test".to_string(),
            postgresql: Default::default(),
            storage: StorageConfiguration {
                size: "10Gi".to_string(),
                storage_class: None,
            },
            inherited_metadata: None,
            stop_delay: 30,
            affinity: None,
            bootstrap: None,
            replica: None,
            external_clusters: vec![],
            plugins: vec![],
        },
    );
    cluster.status = Some(ClusterStatus {
        phase: Some(phase.to_string()),
        current_primary: Some(format!("{}-1", name)),
        ready_instances: Some(ready),
        instances: Some(ready),
    });
    cluster
}
