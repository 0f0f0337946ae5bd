//! Tests for the snapshot record source
//!
//! These use a temporary directory of JSON snapshots in place of provider APIs.

#[cfg(test)]
mod snapshot_source_tests {
    use crate::models::{AccountSpec, ServiceCategory};
    use crate::source::{RecordSource, SnapshotSource};
    use tempfile::TempDir;
    use tokio::fs;

    fn account(name: &str) -> AccountSpec {
        AccountSpec {
            name: name.to_string(),
            region: "us-east-1".to_string(),
            rds: true,
            elasticache: true,
        }
    }

    /// Helper to write a snapshot file for an account
    async fn write_snapshot(temp_dir: &TempDir, name: &str, body: &str) {
        fs::write(temp_dir.path().join(format!("{}.json", name)), body)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_returns_requested_service() {
        let temp_dir = TempDir::new().unwrap();
        write_snapshot(
            &temp_dir,
            "prod",
            r#"{
                "ec2_vpc": {
                    "running": [
                        {"id": "i-1", "instance_type": "m5.large", "region": "us-east-1",
                         "availability_zone": "us-east-1a", "platform": "Linux/UNIX"}
                    ],
                    "reservations": [
                        {"id": "ri-1", "instance_type": "m5.large", "region": "us-east-1",
                         "platform": "Linux/UNIX", "quantity": 2,
                         "expires_at": "2030-01-01T00:00:00Z"}
                    ]
                },
                "rds": {
                    "running": [
                        {"id": "db-1", "instance_type": "db.r5.large", "region": "us-east-1",
                         "engine": "postgres"}
                    ]
                }
            }"#,
        )
        .await;

        let source = SnapshotSource::new(temp_dir.path());

        let vpc = source
            .fetch(&account("prod"), ServiceCategory::Ec2Vpc)
            .await
            .unwrap();
        assert_eq!(vpc.running.len(), 1);
        assert_eq!(vpc.reservations.len(), 1);
        assert_eq!(vpc.reservations[0].quantity, 2);
        assert_eq!(vpc.reservations[0].availability_zone, None);

        let rds = source
            .fetch(&account("prod"), ServiceCategory::Rds)
            .await
            .unwrap();
        assert_eq!(rds.running.len(), 1);
        assert!(rds.reservations.is_empty());
    }

    #[tokio::test]
    async fn test_missing_section_is_empty_batch() {
        let temp_dir = TempDir::new().unwrap();
        write_snapshot(&temp_dir, "dev", "{}").await;

        let source = SnapshotSource::new(temp_dir.path());
        let batch = source
            .fetch(&account("dev"), ServiceCategory::ElastiCache)
            .await
            .unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let source = SnapshotSource::new(temp_dir.path());

        let err = source
            .fetch(&account("ghost"), ServiceCategory::Ec2Classic)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("ghost.json"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_error() {
        let temp_dir = TempDir::new().unwrap();
        write_snapshot(&temp_dir, "bad", "{ not json").await;

        let source = SnapshotSource::new(temp_dir.path());
        let err = source
            .fetch(&account("bad"), ServiceCategory::Ec2Classic)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse snapshot"));
    }

    #[tokio::test]
    async fn test_account_file_read_once_per_run() {
        let temp_dir = TempDir::new().unwrap();
        write_snapshot(
            &temp_dir,
            "prod",
            r#"{"rds": {"running": [
                {"id": "db-1", "instance_type": "db.r5.large", "region": "us-east-1",
                 "engine": "postgres"}
            ]}}"#,
        )
        .await;

        let source = SnapshotSource::new(temp_dir.path());
        let first = source
            .fetch(&account("prod"), ServiceCategory::Ec2Vpc)
            .await
            .unwrap();
        assert!(first.is_empty());

        // Later fetches come from the parsed snapshot, not the file
        fs::remove_file(temp_dir.path().join("prod.json"))
            .await
            .unwrap();

        let rds = source
            .fetch(&account("prod"), ServiceCategory::Rds)
            .await
            .unwrap();
        assert_eq!(rds.running.len(), 1);

        let again = source
            .fetch(&account("prod"), ServiceCategory::Rds)
            .await
            .unwrap();
        assert_eq!(again.running.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let temp_dir = TempDir::new().unwrap();
        let source = SnapshotSource::new(temp_dir.path());

        assert!(source
            .fetch(&account("late"), ServiceCategory::Ec2Classic)
            .await
            .is_err());

        write_snapshot(&temp_dir, "late", r#"{"rds": {}}"#).await;
        let batch = source
            .fetch(&account("late"), ServiceCategory::Rds)
            .await
            .unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_path_for_account() {
        let source = SnapshotSource::new("/var/lib/snapshots");
        assert_eq!(
            source.path_for(&account("prod")),
            std::path::PathBuf::from("/var/lib/snapshots/prod.json")
        );
        assert_eq!(source.dir(), std::path::Path::new("/var/lib/snapshots"));
    }
}
