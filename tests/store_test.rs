//! Mapping store: lookup-or-create atomicity, validation, defaults.

mod helpers;

use cloudlink::db::entities::mapping::{self, MappingKind, SyncDirection};
use cloudlink::{store, time, SyncError};
use helpers::test_db;
use pretty_assertions::assert_eq;
use sea_orm::EntityTrait;

fn filter(ext_id: &str) -> store::IdentityFilter {
    store::IdentityFilter::new(MappingKind::Customer, "MY_SUPER_STORE", "customer", ext_id)
}

#[tokio::test]
async fn find_or_create_is_idempotent() {
    let (db, _dir) = test_db().await;

    let a = store::find_or_create(db.conn(), &filter("C1")).await.unwrap();
    let b = store::find_or_create(db.conn(), &filter("C1")).await.unwrap();
    assert_eq!(a.id, b.id);

    let rows = mapping::Entity::find().all(db.conn()).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn concurrent_find_or_create_yields_one_row() {
    let (db, _dir) = test_db().await;

    let (f1, f2) = (filter("C1"), filter("C1"));
    let (a, b) = tokio::join!(
        store::find_or_create(db.conn(), &f1),
        store::find_or_create(db.conn(), &f2),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id, b.id);

    let rows = mapping::Entity::find().all(db.conn()).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn distinct_identities_get_distinct_rows() {
    let (db, _dir) = test_db().await;

    let a = store::find_or_create(db.conn(), &filter("C1")).await.unwrap();
    let b = store::find_or_create(db.conn(), &filter("C2")).await.unwrap();
    let c = store::find_or_create(db.conn(), &filter("C1").with_direction(SyncDirection::Pull))
        .await
        .unwrap();
    assert_ne!(a.id, b.id);
    // same external identity, different direction: its own row
    assert_ne!(a.id, c.id);
}

#[tokio::test]
async fn new_rows_carry_defaults() {
    let (db, _dir) = test_db().await;

    let record = store::find_or_create(db.conn(), &filter("C1")).await.unwrap();
    assert_eq!(record.sync_direction, SyncDirection::Push);
    assert_eq!(record.clab_type, "customer");
    assert_eq!(record.clab_id, None);
    assert!(record.never_synced());
    assert_eq!(record.err_count, 0);
    assert!(!record.is_ignored);
    assert!(!record.is_locked);
}

#[tokio::test]
async fn empty_identity_fields_fail_validation() {
    let (db, _dir) = test_db().await;

    let empty_id = store::IdentityFilter::new(MappingKind::Customer, "STORE", "customer", "");
    match store::find_or_create(db.conn(), &empty_id).await {
        Err(SyncError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }

    let mut record = store::find_or_create(db.conn(), &filter("C1")).await.unwrap();
    record.ext_channel = String::new();
    match store::save(db.conn(), record).await {
        Err(SyncError::Validation(_)) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn save_keeps_clab_type_in_step_with_kind() {
    let (db, _dir) = test_db().await;

    let mut record = store::find_or_create(db.conn(), &filter("C1")).await.unwrap();
    record.clab_type = "bogus".to_string();
    let record = store::save(db.conn(), record).await.unwrap();
    assert_eq!(record.clab_type, "customer");
}

#[tokio::test]
async fn reset_clears_error_state_and_sync_time() {
    let (db, _dir) = test_db().await;

    let mut record = store::find_or_create(db.conn(), &filter("C1")).await.unwrap();
    record.last_sync = chrono::Utc::now();
    record.err_count = 10;
    record.err_msg = Some("remote kept failing".to_string());
    let record = store::save(db.conn(), record).await.unwrap();

    let record = store::reset(db.conn(), record).await.unwrap();
    assert!(time::is_sentinel(record.last_sync));
    assert_eq!(record.err_count, 0);
    assert_eq!(record.err_msg, None);
}
