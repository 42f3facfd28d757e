use dm_store::domain::message::now_utc;

mod common;

#[tokio::test]
async fn test_thread_marks_only_callers_messages_read() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", Some("https://cdn.example/alice.jpg")).await;
    let bob = common::create_user(&pool, "bob", Some("https://cdn.example/bob.jpg")).await;
    let base = now_utc();

    let ids = common::seed(
        &mut store,
        vec![common::message_at(&alice, &bob, "hi bob", base, 0), common::message_at(&bob, &alice, "hi alice", base, 1)],
    )
    .await;

    let before = now_utc();
    let thread = store.get_thread(&alice.username, &bob.username).await.unwrap();

    assert_eq!(thread.iter().map(|m| m.id).collect::<Vec<_>>(), ids);
    assert_eq!(thread[0].date_read, None, "message addressed to bob stays unread");
    let read_at = thread[1].date_read.expect("message addressed to alice is marked read");
    assert!(read_at >= before);
    assert_eq!(thread[1].sender_photo_url.as_deref(), Some("https://cdn.example/bob.jpg"));
    assert_eq!(thread[1].recipient_photo_url.as_deref(), Some("https://cdn.example/alice.jpg"));

    // The read receipt is durable.
    let stored = store.get_by_id(ids[1]).await.unwrap().unwrap();
    assert_eq!(stored.date_read, Some(read_at));
    let untouched = store.get_by_id(ids[0]).await.unwrap().unwrap();
    assert!(untouched.is_unread());
}

#[tokio::test]
async fn test_thread_is_idempotent() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;
    let bob = common::create_user(&pool, "bob", None).await;
    let base = now_utc();

    common::seed(
        &mut store,
        vec![common::message_at(&bob, &alice, "one", base, 0), common::message_at(&bob, &alice, "two", base, 1)],
    )
    .await;

    let first = store.get_thread(&alice.username, &bob.username).await.unwrap();
    let second = store.get_thread(&alice.username, &bob.username).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert!(second.iter().all(|m| m.date_read.is_some()));
}

#[tokio::test]
async fn test_thread_is_chronological_and_honours_viewer_deletes() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;
    let bob = common::create_user(&pool, "bob", None).await;
    let carol = common::create_user(&pool, "carol", None).await;
    let base = now_utc();

    let ids = common::seed(
        &mut store,
        vec![
            common::message_at(&alice, &bob, "a1", base, 0),
            common::message_at(&bob, &alice, "b1", base, 1),
            common::message_at(&carol, &alice, "elsewhere", base, 2),
            common::message_at(&alice, &bob, "a2", base, 3),
            common::message_at(&bob, &alice, "b2", base, 4),
        ],
    )
    .await;

    // Alice hides one sent and one received message; Bob's view is unaffected.
    store.stage_delete_for_user(ids[0], &alice.username).await.unwrap();
    store.stage_delete_for_user(ids[1], &alice.username).await.unwrap();
    assert!(store.save_changes().await.unwrap());

    let alice_view = store.get_thread(&alice.username, &bob.username).await.unwrap();
    assert_eq!(alice_view.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[3], ids[4]]);

    let bob_view = store.get_thread(&bob.username, &alice.username).await.unwrap();
    assert_eq!(bob_view.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[0], ids[1], ids[3], ids[4]]);
}

#[tokio::test]
async fn test_thread_does_not_flush_staged_changes() {
    let pool = common::get_test_pool().await;
    let mut store = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;
    let bob = common::create_user(&pool, "bob", None).await;

    store.stage_add(common::message_at(&bob, &alice, "draft", now_utc(), 0));
    let thread = store.get_thread(&alice.username, &bob.username).await.unwrap();

    assert!(thread.is_empty());
    assert_eq!(store.pending_changes().len(), 1);
}

#[tokio::test]
async fn test_concurrent_thread_reads_return_the_stored_read_time() {
    let pool = common::get_test_pool().await;
    let mut seeder = common::new_store(&pool);
    let first = common::new_store(&pool);
    let second = common::new_store(&pool);

    let alice = common::create_user(&pool, "alice", None).await;
    let bob = common::create_user(&pool, "bob", None).await;

    for round in 0..20 {
        let ids = common::seed(&mut seeder, vec![common::message_at(&bob, &alice, "ping", now_utc(), round)]).await;

        let (a, b) = tokio::join!(
            first.get_thread(&alice.username, &bob.username),
            second.get_thread(&alice.username, &bob.username)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let stored = seeder.get_by_id(ids[0]).await.unwrap().unwrap().date_read;
        assert!(stored.is_some(), "round {round}: message was not marked read");

        for view in [&a, &b] {
            let returned = view.iter().find(|m| m.id == ids[0]).expect("message is in the thread").date_read;
            assert_eq!(returned, stored, "round {round}: returned read time differs from the stored one");
        }
    }
}
