//! Durability tests for the RocksDB storage backend.
//!
//! Each test writes through the service, drops it together with the
//! database handle, then reopens the same path and checks what survived.

#![cfg(feature = "rocksdb-storage")]

use std::sync::Arc;

use tempfile::TempDir;
use verso::config::LimitsConfig;
use verso::store::{open_db, RocksBackend, StorageBackend};
use verso::{PublishState, VersionControlService, VersionStatus};

fn open(dir: &TempDir) -> VersionControlService {
    let db = open_db(dir.path()).unwrap();
    let backend: Arc<dyn StorageBackend> = Arc::new(RocksBackend::new(db));
    VersionControlService::new(backend, LimitsConfig::default())
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let service = open(&dir);
        service
            .create_version("doc", "hello".into(), Some("init".into()))
            .await
            .unwrap();
        service
            .create_version("doc", "hello world".into(), None)
            .await
            .unwrap();
        service.publish("doc", 1, "alice").await.unwrap();
        service.publish("doc", 2, "bob").await.unwrap();
        service.create_tag("doc", 2, "release").await.unwrap();
    }

    let service = open(&dir);
    let versions = service.list_versions("doc").await.unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].message, "init");
    assert_eq!(versions[0].status, VersionStatus::Draft);
    assert_eq!(versions[1].published_by.as_deref(), Some("bob"));

    assert_eq!(
        service.publish_state("doc").await.unwrap(),
        PublishState::Published { version_id: 2 }
    );
    assert_eq!(service.get_tag("release").await.unwrap().version_id, 2);

    let history = service.publish_history("doc").await.unwrap();
    let publishers: Vec<&str> = history.iter().map(|r| r.published_by.as_str()).collect();
    assert_eq!(publishers, vec!["alice", "bob"]);
}

#[tokio::test]
async fn test_id_counter_survives_delete_and_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let service = open(&dir);
        service.create_version("doc", "a".into(), None).await.unwrap();
        service.create_version("doc", "b".into(), None).await.unwrap();
        service.create_tag("doc", 2, "newest").await.unwrap();
        service.delete_version("doc", 2).await.unwrap();
    }

    let service = open(&dir);
    assert!(service.get_tag("newest").await.unwrap_err().is_not_found());
    let next = service.create_version("doc", "c".into(), None).await.unwrap();
    assert_eq!(next.id, 3);
}

#[tokio::test]
async fn test_failed_mutation_leaves_no_trace() {
    let dir = TempDir::new().unwrap();

    {
        let service = open(&dir);
        service.create_version("doc", "a".into(), None).await.unwrap();
        service.publish("doc", 1, "alice").await.unwrap();
        assert!(service.delete_version("doc", 1).await.is_err());
        assert!(service.publish("doc", 9, "alice").await.is_err());
    }

    let service = open(&dir);
    assert_eq!(service.list_versions("doc").await.unwrap().len(), 1);
    assert_eq!(service.current_version("doc").await.unwrap().id, 1);
    assert_eq!(service.publish_history("doc").await.unwrap().len(), 1);
}
