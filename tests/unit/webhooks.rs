//! Unit tests for admission policies

use documentdb_operator::webhooks::{ValidationContext, validate_all};

use crate::common::*;

mod create_tests {
    use super::*;

    #[test]
    fn test_valid_create_allowed() {
        let db = create_replicated_documentdb(
            "db",
            "default",
            "cluster-a",
            &["cluster-a", "cluster-b"],
        );
        let result = validate_all(&ValidationContext::new(&db, None));
        assert!(result.allowed);
        assert!(result.reason.is_none());
    }

    #[test]
    fn test_invalid_spec_denied() {
        let db = DocumentDBBuilder::new("db", "default").with_instances(5).build();
        let result = validate_all(&ValidationContext::new(&db, None));
        assert!(!result.allowed);
        assert_eq!(result.reason.as_deref(), Some("InvalidSpec"));
        assert!(result.message.unwrap().contains("instancesPerNode"));
    }

    #[test]
    fn test_primary_outside_membership_denied() {
        let db = create_replicated_documentdb(
            "db",
            "default",
            "cluster-x",
            &["cluster-a", "cluster-b"],
        );
        let result = validate_all(&ValidationContext::new(&db, None));
        assert_eq!(result.reason.as_deref(), Some("InvalidSpec"));
    }
}

mod update_tests {
    use super::*;

    #[test]
    fn test_failover_update_allowed() {
        let old = create_replicated_documentdb(
            "db",
            "default",
            "cluster-a",
            &["cluster-a", "cluster-b", "cluster-c"],
        );
        let new = create_replicated_documentdb(
            "db",
            "default",
            "cluster-b",
            &["cluster-b", "cluster-c"],
        );
        let result = validate_all(&ValidationContext::new(&new, Some(&old)));
        assert!(result.allowed);
    }

    #[test]
    fn test_dropping_primary_without_promotion_denied() {
        let old = create_replicated_documentdb(
            "db",
            "default",
            "cluster-a",
            &["cluster-a", "cluster-b"],
        );
        let mut new = old.clone();
        if let Some(r) = new.spec.cluster_replication.as_mut() {
            r.cluster_list.remove(0);
        }
        // The remaining spec is invalid too; spec validation runs first
        let result = validate_all(&ValidationContext::new(&new, Some(&old)));
        assert!(!result.allowed);
    }

    #[test]
    fn test_storage_class_change_denied() {
        let old = DocumentDBBuilder::new("db", "default")
            .with_storage("10Gi", Some("standard"))
            .build();
        let new = DocumentDBBuilder::new("db", "default")
            .with_storage("10Gi", Some("premium"))
            .build();
        let result = validate_all(&ValidationContext::new(&new, Some(&old)));
        assert_eq!(result.reason.as_deref(), Some("StorageClassImmutable"));
    }

    #[test]
    fn test_recovery_change_denied() {
        let old = DocumentDBBuilder::new("db", "default")
            .with_backup_recovery("nightly")
            .build();
        let new = DocumentDBBuilder::new("db", "default")
            .with_volume_recovery("pv-1")
            .with_backup_recovery("nightly")
            .build();
        let result = validate_all(&ValidationContext::new(&new, Some(&old)));
        assert_eq!(result.reason.as_deref(), Some("RecoveryImmutable"));
    }

    #[test]
    fn test_scaling_instances_allowed() {
        let old = create_test_documentdb("db", "default");
        let new = DocumentDBBuilder::new("db", "default").with_instances(3).build();
        let ctx = ValidationContext::new(&new, Some(&old));
        assert!(!ctx.is_create());
        assert!(validate_all(&ctx).allowed);
    }
}
