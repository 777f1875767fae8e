//! Bootstrap mode resolution
//!
//! Decides how a new underlying cluster is initialized. Exactly one of three
//! modes applies:
//!
//! - `Fresh`: run the initialization statements on an empty data directory
//! - `BackupRecovery`: restore from a named backup artifact
//! - `VolumeRecovery`: start from a retained persistent volume, attached
//!   through a temporary claim
//!
//! Decision order (first match wins):
//!
//! 1. `bootstrap.recovery.persistentVolume.name` non-empty
//! 2. `bootstrap.recovery.backup.name` non-empty
//! 3. otherwise `Fresh`
//!
//! Both recovery sources only apply to the primary region. Any other member
//! starts `Fresh` and streams from the primary, whatever recovery source is
//! declared.

use std::fmt;

use kube::ResourceExt;

use crate::crd::DocumentDB;
use crate::crd::cnpg::{
    BootstrapConfiguration, BootstrapInitDb, BootstrapRecovery, Cluster, DataSource,
    LocalObjectReference, TypedLocalObjectReference,
};

/// Suffix of the temporary claim created for volume recovery
pub const RECOVERY_CLAIM_SUFFIX: &str = "-pv-recovery-temp";

/// Extension installed in every fresh cluster
pub const DOCUMENTDB_EXTENSION: &str = "documentdb";

/// Application role used by the gateway
pub const APPLICATION_ROLE: &str = "documentdb";

/// Initial password of the application role; the gateway rotates it after startup
const APPLICATION_ROLE_PASSWORD: &str = "Admin100";

/// Initialization statements for a fresh cluster, in execution order
pub fn init_statements() -> Vec<String> {
    vec![
        format!("CREATE EXTENSION {} CASCADE", DOCUMENTDB_EXTENSION),
        format!(
            "CREATE ROLE {} WITH LOGIN PASSWORD '{}'",
            APPLICATION_ROLE, APPLICATION_ROLE_PASSWORD
        ),
        format!(
            "ALTER ROLE {} WITH SUPERUSER CREATEDB CREATEROLE REPLICATION BYPASSRLS",
            APPLICATION_ROLE
        ),
    ]
}

/// Name of the temporary claim bound to a retained volume
pub fn recovery_claim_name(resource_name: &str) -> String {
    format!("{}{}", resource_name, RECOVERY_CLAIM_SUFFIX)
}

/// The single initialization mode chosen for a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedBootstrap {
    /// Initialize an empty cluster and run `statements` once, in order
    Fresh { statements: Vec<String> },
    /// Restore from the named backup
    BackupRecovery { backup_name: String },
    /// Start from `volume_name` through the temporary claim `claim_name`
    VolumeRecovery {
        claim_name: String,
        volume_name: String,
    },
}

impl ResolvedBootstrap {
    pub fn fresh() -> Self {
        ResolvedBootstrap::Fresh {
            statements: init_statements(),
        }
    }

    /// Short name recorded in status
    pub fn mode(&self) -> &'static str {
        match self {
            ResolvedBootstrap::Fresh { .. } => "Fresh",
            ResolvedBootstrap::BackupRecovery { .. } => "BackupRecovery",
            ResolvedBootstrap::VolumeRecovery { .. } => "VolumeRecovery",
        }
    }

    /// Temporary claim that must exist before the cluster is created, if any
    pub fn recovery_claim(&self) -> Option<(&str, &str)> {
        match self {
            ResolvedBootstrap::VolumeRecovery {
                claim_name,
                volume_name,
            } => Some((claim_name.as_str(), volume_name.as_str())),
            _ => None,
        }
    }

    /// Translate into the underlying cluster's bootstrap union
    pub fn to_cluster_bootstrap(&self) -> BootstrapConfiguration {
        match self {
            ResolvedBootstrap::Fresh { statements } => BootstrapConfiguration {
                initdb: Some(BootstrapInitDb {
                    post_init_sql: statements.clone(),
                }),
                recovery: None,
            },
            ResolvedBootstrap::BackupRecovery { backup_name } => BootstrapConfiguration {
                initdb: None,
                recovery: Some(BootstrapRecovery {
                    backup: Some(LocalObjectReference {
                        name: backup_name.clone(),
                    }),
                    volume_snapshots: None,
                }),
            },
            ResolvedBootstrap::VolumeRecovery { claim_name, .. } => BootstrapConfiguration {
                initdb: None,
                recovery: Some(BootstrapRecovery {
                    backup: None,
                    volume_snapshots: Some(DataSource {
                        storage: TypedLocalObjectReference {
                            api_group: String::new(),
                            kind: "PersistentVolumeClaim".to_string(),
                            name: claim_name.clone(),
                        },
                    }),
                }),
            },
        }
    }
}

impl fmt::Display for ResolvedBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedBootstrap::Fresh { statements } => {
                write!(f, "Fresh ({} statements)", statements.len())
            }
            ResolvedBootstrap::BackupRecovery { backup_name } => {
                write!(f, "BackupRecovery (backup {})", backup_name)
            }
            ResolvedBootstrap::VolumeRecovery {
                claim_name,
                volume_name,
            } => write!(
                f,
                "VolumeRecovery (volume {} via {})",
                volume_name, claim_name
            ),
        }
    }
}

/// Resolve the bootstrap mode for a declaration
///
/// Total: any declaration resolves to exactly one mode.
pub fn resolve(db: &DocumentDB, is_primary_region: bool) -> ResolvedBootstrap {
    if !is_primary_region {
        return ResolvedBootstrap::fresh();
    }

    let recovery = db
        .spec
        .bootstrap
        .as_ref()
        .and_then(|b| b.recovery.as_ref());

    let volume_name = recovery
        .and_then(|r| r.persistent_volume.as_ref())
        .map(|pv| pv.name.as_str())
        .filter(|name| !name.is_empty());

    if let Some(volume_name) = volume_name {
        return ResolvedBootstrap::VolumeRecovery {
            claim_name: recovery_claim_name(&db.name_any()),
            volume_name: volume_name.to_string(),
        };
    }

    let backup_name = recovery
        .and_then(|r| r.backup.as_ref())
        .map(|b| b.name.as_str())
        .filter(|name| !name.is_empty());

    match backup_name {
        Some(backup_name) => ResolvedBootstrap::BackupRecovery {
            backup_name: backup_name.to_string(),
        },
        None => ResolvedBootstrap::fresh(),
    }
}

/// Bootstrap section to emit for the underlying cluster
///
/// Recovery happens once, at creation. An existing cluster keeps the
/// bootstrap it was created with, whatever the declaration resolves to now.
pub fn effective_bootstrap(
    existing: Option<&Cluster>,
    resolved: &ResolvedBootstrap,
) -> Option<BootstrapConfiguration> {
    match existing.and_then(|cluster| cluster.spec.bootstrap.as_ref()) {
        Some(current) => Some(current.clone()),
        None => Some(resolved.to_cluster_bootstrap()),
    }
}

/// Whether a reconciliation in `member_name` targets the primary region
///
/// Without a replication block every member is its own primary.
pub fn is_primary_region(db: &DocumentDB, member_name: &str) -> bool {
    match db.spec.cluster_replication.as_ref() {
        None => true,
        Some(replication) => replication.primary == member_name,
    }
}
