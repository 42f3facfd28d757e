use dm_store::domain::message::now_utc;
use dm_store::storage::unit_of_work::PendingChange;
use dm_store::{AppError, DeleteOutcome, NewMessage};
use uuid::Uuid;

mod common;

#[tokio::test]
async fn test_save_without_changes_reports_nothing_written() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    assert!(!store.save_changes().await.unwrap());
}

#[tokio::test]
async fn test_staged_add_is_written_only_on_save() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;
    let bob = common::create_user(&pool, "bob", None).await;

    let message = store.stage_send(&alice.username, &bob.username, "  hello  ").await.unwrap();
    assert_eq!(message.content, "hello");
    assert!(matches!(store.pending_changes(), [PendingChange::Insert(m)] if m.id == message.id));
    assert!(store.get_by_id(message.id).await.unwrap().is_none());

    assert!(store.save_changes().await.unwrap());
    assert!(store.pending_changes().is_empty());

    let stored = store.get_by_id(message.id).await.unwrap().unwrap();
    assert_eq!(stored.sender.id, alice.id);
    assert_eq!(stored.recipient.id, bob.id);
}

#[tokio::test]
async fn test_stage_delete_removes_row() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;
    let bob = common::create_user(&pool, "bob", None).await;
    let ids = common::seed(&mut store, vec![common::message_at(&alice, &bob, "bye", now_utc(), 0)]).await;

    let message = store.get_by_id(ids[0]).await.unwrap().unwrap();
    store.stage_delete(&message);
    assert!(store.save_changes().await.unwrap());

    assert!(store.get_by_id(ids[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_by_both_parties_purges() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;
    let bob = common::create_user(&pool, "bob", None).await;
    let carol = common::create_user(&pool, "carol", None).await;
    let ids = common::seed(&mut store, vec![common::message_at(&alice, &bob, "x", now_utc(), 0)]).await;

    let err = store.stage_delete_for_user(ids[0], &carol.username).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
    assert!(store.pending_changes().is_empty());

    assert_eq!(store.stage_delete_for_user(ids[0], &alice.username).await.unwrap(), DeleteOutcome::SoftDeleted);
    assert!(store.save_changes().await.unwrap());
    let soft = store.get_by_id(ids[0]).await.unwrap().unwrap();
    assert!(soft.sender_deleted);
    assert!(!soft.recipient_deleted);

    assert_eq!(store.stage_delete_for_user(ids[0], &bob.username).await.unwrap(), DeleteOutcome::Purged);
    assert!(store.save_changes().await.unwrap());
    assert!(store.get_by_id(ids[0]).await.unwrap().is_none());

    let missing = store.stage_delete_for_user(ids[0], &bob.username).await.unwrap_err();
    assert!(matches!(missing, AppError::NotFound));
}

#[tokio::test]
async fn test_send_validation() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;

    let to_self = store.stage_send(&alice.username, &alice.username, "me").await.unwrap_err();
    assert!(matches!(to_self, AppError::BadRequest(_)));

    let unknown = store.stage_send(&alice.username, "nobody_here_at_all", "hello").await.unwrap_err();
    assert!(matches!(unknown, AppError::NotFound));

    let bob = common::create_user(&pool, "bob", None).await;
    let empty = store.stage_send(&alice.username, &bob.username, "   ").await.unwrap_err();
    assert!(matches!(empty, AppError::BadRequest(_)));

    assert!(store.pending_changes().is_empty());
}

#[tokio::test]
async fn test_failed_save_rolls_back_and_keeps_changes_staged() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;
    let bob = common::create_user(&pool, "bob", None).await;

    let valid = NewMessage::new(alice.id, bob.id, "valid");
    let dangling = NewMessage::new(alice.id, Uuid::new_v4(), "to nobody");
    store.stage_add(valid.clone());
    store.stage_add(dangling);

    let err = store.save_changes().await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
    assert_eq!(store.pending_changes().len(), 2);
    assert!(store.get_by_id(valid.id).await.unwrap().is_none(), "partial commit must not be visible");
}
