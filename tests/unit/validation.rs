//! Unit tests for validation logic

use documentdb_operator::controller::validation::{
    MAX_INSTANCES_PER_NODE, MIN_INSTANCES_PER_NODE, SUPPORTED_NODE_COUNT, validate_spec,
};
use documentdb_operator::crd::MemberCluster;

use crate::common::*;

mod topology_tests {
    use super::*;

    #[test]
    fn test_instance_range() {
        for instances in MIN_INSTANCES_PER_NODE..=MAX_INSTANCES_PER_NODE {
            let db = DocumentDBBuilder::new("db", "default")
                .with_instances(instances)
                .build();
            assert!(validate_spec(&db).is_ok(), "{instances} instances should be valid");
        }
    }

    #[test]
    fn test_instances_out_of_range() {
        for instances in [0, -1, MAX_INSTANCES_PER_NODE + 1] {
            let db = DocumentDBBuilder::new("db", "default")
                .with_instances(instances)
                .build();
            let err = validate_spec(&db).unwrap_err();
            assert!(err.to_string().contains("instancesPerNode"));
        }
    }

    #[test]
    fn test_only_single_node_supported() {
        assert_eq!(SUPPORTED_NODE_COUNT, 1);
        let db = DocumentDBBuilder::new("db", "default").with_node_count(2).build();
        assert!(validate_spec(&db).is_err());
    }
}

mod storage_tests {
    use super::*;

    #[test]
    fn test_valid_sizes() {
        for size in ["1Gi", "500Mi", "2Ti"] {
            let db = DocumentDBBuilder::new("db", "default")
                .with_storage(size, None)
                .build();
            assert!(validate_spec(&db).is_ok(), "{size} should be valid");
        }
    }

    #[test]
    fn test_invalid_sizes() {
        for size in ["", "10", "10GB", "abcGi", "0Gi"] {
            let db = DocumentDBBuilder::new("db", "default")
                .with_storage(size, None)
                .build();
            assert!(validate_spec(&db).is_err(), "{size} should be rejected");
        }
    }
}

mod replication_tests {
    use super::*;

    #[test]
    fn test_valid_replication() {
        let db = create_replicated_documentdb(
            "db",
            "default",
            "cluster-a",
            &["cluster-a", "cluster-b"],
        );
        assert!(validate_spec(&db).is_ok());
    }

    #[test]
    fn test_empty_primary_allowed() {
        let db = create_replicated_documentdb("db", "default", "", &["cluster-a"]);
        assert!(validate_spec(&db).is_ok());
    }

    #[test]
    fn test_empty_membership_rejected() {
        let db = create_replicated_documentdb("db", "default", "", &[]);
        assert!(validate_spec(&db).is_err());
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let db = create_replicated_documentdb(
            "db",
            "default",
            "cluster-a",
            &["cluster-a", "cluster-a"],
        );
        let err = validate_spec(&db).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_unnamed_member_rejected() {
        let mut db = create_replicated_documentdb("db", "default", "cluster-a", &["cluster-a"]);
        if let Some(r) = db.spec.cluster_replication.as_mut() {
            r.cluster_list.push(MemberCluster::new(""));
        }
        assert!(validate_spec(&db).is_err());
    }

    #[test]
    fn test_primary_must_be_member() {
        let db = create_replicated_documentdb("db", "default", "cluster-x", &["cluster-a"]);
        let err = validate_spec(&db).unwrap_err();
        assert!(err.to_string().contains("cluster-x"));
    }
}
