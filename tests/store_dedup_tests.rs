//! Store-level dedup guarantees: the unique index on `sku` must hold even
//! when the orchestrator's existence pre-check races with a concurrent run.

use std::sync::Arc;

use lapcat::domain::repositories::{CatalogStore, InsertOutcome};
use lapcat::infrastructure::{DatabaseConnection, SqliteCatalogStore};
use lapcat::test_utils::sample_record;
use tempfile::tempdir;

async fn file_store(dir: &tempfile::TempDir) -> SqliteCatalogStore {
    let db_path = dir.path().join("catalog.db");
    let database_url = format!("sqlite:{}", db_path.display());
    let db = DatabaseConnection::new(&database_url).await.unwrap();
    db.migrate().await.unwrap();
    SqliteCatalogStore::new(db.pool().clone())
}

#[tokio::test]
async fn concurrent_same_sku_inserts_store_exactly_one_record() {
    let dir = tempdir().unwrap();
    let store = Arc::new(file_store(&dir).await);

    let record = sample_record("lenovo_thinkpad_e14_intel");

    let store_a = store.clone();
    let record_a = record.clone();
    let task_a = tokio::spawn(async move { store_a.insert(&record_a).await.unwrap() });

    let store_b = store.clone();
    let record_b = record.clone();
    let task_b = tokio::spawn(async move { store_b.insert(&record_b).await.unwrap() });

    let mut outcomes = vec![task_a.await.unwrap(), task_b.await.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, InsertOutcome::DuplicateSku));

    assert_eq!(
        outcomes,
        vec![InsertOutcome::Inserted, InsertOutcome::DuplicateSku]
    );
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn pre_check_is_advisory_the_index_is_authoritative() {
    let dir = tempdir().unwrap();
    let store = file_store(&dir).await;

    let record = sample_record("hp_probook_450_g10");

    // Simulate the race window: the pre-check sees nothing, but a concurrent
    // run inserts before we do.
    assert!(store.find_by_sku(&record.sku).await.unwrap().is_none());
    assert_eq!(store.insert(&record).await.unwrap(), InsertOutcome::Inserted);

    // Our delayed insert must degrade to a no-op, not a crash.
    assert_eq!(
        store.insert(&record).await.unwrap(),
        InsertOutcome::DuplicateSku
    );
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn records_survive_reopening_the_database() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let database_url = format!("sqlite:{}", db_path.display());

    {
        let db = DatabaseConnection::new(&database_url).await.unwrap();
        db.migrate().await.unwrap();
        let store = SqliteCatalogStore::new(db.pool().clone());
        store
            .insert(&sample_record("lenovo_thinkpad_e14_amd"))
            .await
            .unwrap();
    }

    let db = DatabaseConnection::new(&database_url).await.unwrap();
    db.migrate().await.unwrap();
    let store = SqliteCatalogStore::new(db.pool().clone());

    let record = store
        .find_by_sku("lenovo_thinkpad_e14_amd")
        .await
        .unwrap()
        .expect("record persisted across reopen");
    assert_eq!(record.canonical_name, "Lenovo Thinkpad E14 Amd");
}
