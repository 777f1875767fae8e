//! Unit tests for bootstrap resolution and the recovery claim

use k8s_openapi::api::core::v1::PersistentVolumeClaim;

use documentdb_operator::crd::DocumentDB;
use documentdb_operator::crd::cnpg::Cluster;
use documentdb_operator::resources::bootstrap::{
    RECOVERY_CLAIM_SUFFIX, ResolvedBootstrap, effective_bootstrap, init_statements,
    is_primary_region, recovery_claim_name, resolve,
};
use documentdb_operator::resources::cluster::{
    BuildFlags, ClusterIdentity, ImageConfig, generate_cluster,
};
use documentdb_operator::resources::recovery_claim::{claim_to_delete, generate_recovery_claim};

use crate::common::*;

mod resolve_tests {
    use super::*;

    #[test]
    fn test_no_recovery_is_fresh() {
        let db = create_test_documentdb("test-cluster", "default");
        let resolved = resolve(&db, true);
        assert_eq!(
            resolved,
            ResolvedBootstrap::Fresh {
                statements: init_statements()
            }
        );
        assert!(resolved.recovery_claim().is_none());
    }

    #[test]
    fn test_volume_recovery() {
        let db = DocumentDBBuilder::new("test-cluster", "default")
            .with_volume_recovery("pv-retained")
            .build();

        match resolve(&db, true) {
            ResolvedBootstrap::VolumeRecovery {
                claim_name,
                volume_name,
            } => {
                assert_eq!(claim_name, "test-cluster-pv-recovery-temp");
                assert_eq!(volume_name, "pv-retained");
            }
            other => panic!("expected volume recovery, got {other:?}"),
        }
    }

    #[test]
    fn test_backup_recovery() {
        let db = DocumentDBBuilder::new("test-cluster", "default")
            .with_backup_recovery("nightly")
            .build();

        assert_eq!(
            resolve(&db, true),
            ResolvedBootstrap::BackupRecovery {
                backup_name: "nightly".to_string()
            }
        );
    }

    #[test]
    fn test_volume_wins_over_backup() {
        let db = DocumentDBBuilder::new("test-cluster", "default")
            .with_backup_recovery("nightly")
            .with_volume_recovery("pv-retained")
            .build();

        let resolved = resolve(&db, true);
        assert_eq!(resolved.mode(), "VolumeRecovery");
        assert_eq!(
            resolved.recovery_claim(),
            Some(("test-cluster-pv-recovery-temp", "pv-retained"))
        );
    }

    #[test]
    fn test_empty_names_are_ignored() {
        let db = DocumentDBBuilder::new("test-cluster", "default")
            .with_volume_recovery("")
            .with_backup_recovery("")
            .build();

        assert_eq!(resolve(&db, true).mode(), "Fresh");
    }

    #[test]
    fn test_non_primary_region_is_always_fresh() {
        let db = DocumentDBBuilder::new("test-cluster", "default")
            .with_replication("cluster-a", &["cluster-a", "cluster-b"])
            .with_volume_recovery("pv-retained")
            .with_backup_recovery("nightly")
            .build();

        assert!(!is_primary_region(&db, "cluster-b"));
        assert_eq!(resolve(&db, false).mode(), "Fresh");
        assert_eq!(resolve(&db, true).mode(), "VolumeRecovery");
    }
}

mod primary_region_tests {
    use super::*;

    #[test]
    fn test_without_replication_every_member_is_primary() {
        let db = create_test_documentdb("test-cluster", "default");
        assert!(is_primary_region(&db, ""));
        assert!(is_primary_region(&db, "cluster-z"));
    }

    #[test]
    fn test_replicated_primary_region() {
        let db = create_replicated_documentdb(
            "test-cluster",
            "default",
            "cluster-a",
            &["cluster-a", "cluster-b"],
        );
        assert!(is_primary_region(&db, "cluster-a"));
        assert!(!is_primary_region(&db, "cluster-b"));
        assert!(!is_primary_region(&db, ""));
    }
}

mod recovery_claim_tests {
    use super::*;

    #[test]
    fn test_claim_name_suffix() {
        assert_eq!(RECOVERY_CLAIM_SUFFIX, "-pv-recovery-temp");
        assert_eq!(recovery_claim_name("db"), "db-pv-recovery-temp");
    }

    #[test]
    fn test_claim_binds_statically_to_volume() {
        let db = DocumentDBBuilder::new("test-cluster", "prod")
            .with_storage("50Gi", Some("premium"))
            .with_volume_recovery("pv-retained")
            .build();

        let claim = generate_recovery_claim(&db, "test-cluster-pv-recovery-temp", "pv-retained");

        assert_eq!(
            claim.metadata.name.as_deref(),
            Some("test-cluster-pv-recovery-temp")
        );
        assert_eq!(claim.metadata.namespace.as_deref(), Some("prod"));

        let owners = claim.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "DocumentDB");
        assert_eq!(owners[0].name, "test-cluster");

        let spec = claim.spec.unwrap();
        assert_eq!(spec.volume_name.as_deref(), Some("pv-retained"));
        assert_eq!(spec.storage_class_name.as_deref(), Some(""));
        assert_eq!(spec.access_modes, Some(vec!["ReadWriteOnce".to_string()]));
        let requests = spec.resources.unwrap().requests.unwrap();
        assert_eq!(requests["storage"].0, "50Gi");
    }
}

mod write_once_tests {
    use super::*;

    /// The cluster as first created for `member`
    fn created_cluster(db: &DocumentDB, member: &str) -> Cluster {
        let flags = BuildFlags {
            is_primary_region: is_primary_region(db, member),
            member_name: member.to_string(),
            gateway_sidecar: true,
        };
        generate_cluster(
            &ClusterIdentity::for_member(db, member),
            db,
            &resolve(db, flags.is_primary_region),
            "",
            &ImageConfig::default(),
            &flags,
        )
    }

    #[test]
    fn test_new_cluster_uses_resolved_bootstrap() {
        let db = DocumentDBBuilder::new("test-cluster", "default")
            .with_backup_recovery("nightly")
            .build();
        let resolved = resolve(&db, true);

        assert_eq!(
            effective_bootstrap(None, &resolved),
            Some(resolved.to_cluster_bootstrap())
        );
    }

    #[test]
    fn test_initdb_survives_added_backup_recovery() {
        let original = create_test_documentdb("test-cluster", "default");
        let existing = created_cluster(&original, "");
        let initdb = existing.spec.bootstrap.clone();
        assert!(initdb.as_ref().unwrap().initdb.is_some());

        let changed = DocumentDBBuilder::new("test-cluster", "default")
            .with_backup_recovery("nightly")
            .build();
        let resolved = resolve(&changed, true);
        assert_eq!(resolved.mode(), "BackupRecovery");

        let bootstrap = effective_bootstrap(Some(&existing), &resolved);
        assert_eq!(bootstrap, initdb);
        assert!(bootstrap.unwrap().recovery.is_none());
    }

    #[test]
    fn test_initdb_survives_replica_becoming_primary() {
        let members = ["cluster-a", "cluster-b"];
        let before = DocumentDBBuilder::new("test-cluster", "default")
            .with_replication("cluster-a", &members)
            .with_backup_recovery("nightly")
            .build();
        let existing = created_cluster(&before, "cluster-b");
        let initdb = existing.spec.bootstrap.clone();
        assert!(initdb.as_ref().unwrap().initdb.is_some());

        let after = DocumentDBBuilder::new("test-cluster", "default")
            .with_replication("cluster-b", &members)
            .with_backup_recovery("nightly")
            .build();
        let resolved = resolve(&after, is_primary_region(&after, "cluster-b"));
        assert_eq!(resolved.mode(), "BackupRecovery");

        assert_eq!(effective_bootstrap(Some(&existing), &resolved), initdb);
    }

    #[test]
    fn test_existing_cluster_without_bootstrap_takes_resolved() {
        let db = create_test_documentdb("test-cluster", "default");
        let mut existing = created_cluster(&db, "");
        existing.spec.bootstrap = None;
        let resolved = resolve(&db, true);

        assert_eq!(
            effective_bootstrap(Some(&existing), &resolved),
            Some(resolved.to_cluster_bootstrap())
        );
    }
}

mod claim_cleanup_tests {
    use super::*;

    fn volume_recovery() -> ResolvedBootstrap {
        ResolvedBootstrap::VolumeRecovery {
            claim_name: "test-cluster-pv-recovery-temp".to_string(),
            volume_name: "pv-retained".to_string(),
        }
    }

    fn claim(terminating: bool) -> PersistentVolumeClaim {
        let mut metadata = serde_json::json!({"name": "test-cluster-pv-recovery-temp"});
        if terminating {
            metadata["deletionTimestamp"] = serde_json::json!("2026-01-01T00:00:00Z");
        }
        serde_json::from_value(serde_json::json!({"metadata": metadata})).unwrap()
    }

    #[test]
    fn test_existing_claim_is_deleted() {
        let resolved = volume_recovery();
        assert_eq!(
            claim_to_delete(&resolved, Some(&claim(false))),
            Some("test-cluster-pv-recovery-temp")
        );
    }

    #[test]
    fn test_absent_claim_is_left_alone() {
        assert_eq!(claim_to_delete(&volume_recovery(), None), None);
    }

    #[test]
    fn test_terminating_claim_is_left_alone() {
        assert_eq!(claim_to_delete(&volume_recovery(), Some(&claim(true))), None);
    }

    #[test]
    fn test_other_modes_have_no_claim() {
        assert_eq!(claim_to_delete(&ResolvedBootstrap::fresh(), Some(&claim(false))), None);
    }
}
