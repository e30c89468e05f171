use serde_json::json;
use std::sync::Arc;

use super::store::connect_pool;
use super::*;

async fn test_archive() -> TranscriptArchive {
    let pool = connect_pool("sqlite::memory:").await.unwrap();
    let archive = TranscriptArchive::new(pool);
    archive.migrate().await.unwrap();
    archive
}

async fn registry_with(limits: SessionLimits) -> (SessionRegistry, Arc<MemorySessionStore>, TranscriptArchive) {
    let store = Arc::new(MemorySessionStore::new());
    let archive = test_archive().await;
    let registry = SessionRegistry::new(store.clone(), archive.clone(), limits);
    (registry, store, archive)
}

async fn default_registry() -> (SessionRegistry, Arc<MemorySessionStore>, TranscriptArchive) {
    registry_with(SessionLimits::default()).await
}

#[tokio::test]
async fn test_append_then_history_round_trip() {
    let (registry, _, _) = default_registry().await;
    let handle = registry.obtain("s1").await.unwrap();

    let appended = handle.append(Role::User, "hello").await.unwrap();
    let history = handle.history().await.unwrap();

    assert_eq!(history.len(), 1);
    assert_eq!(history.last().unwrap(), &appended);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "hello");
}

#[tokio::test]
async fn test_appends_are_ordered_by_timestamp() {
    let (registry, _, _) = default_registry().await;
    let handle = registry.obtain("s1").await.unwrap();

    handle.append(Role::User, "first").await.unwrap();
    handle.append(Role::Assistant, "second").await.unwrap();
    handle.append(Role::User, "third").await.unwrap();

    let history = handle.history().await.unwrap();
    assert_eq!(
        history.iter().map(|e| e.content.as_str()).collect::<Vec<_>>(),
        vec!["first", "second", "third"]
    );
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_concurrent_appends_serialize_on_one_actor() {
    let (registry, _, _) = default_registry().await;
    let registry = Arc::new(registry);

    let mut tasks = Vec::new();
    for i in 0..10 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let handle = registry.obtain("s1").await.unwrap();
            handle.append(Role::User, format!("turn {i}")).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let handle = registry.obtain("s1").await.unwrap();
    let history = handle.history().await.unwrap();
    assert_eq!(history.len(), 10);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(registry.active_count().await, 1);
}

#[tokio::test]
async fn test_append_persists_to_store() {
    let (registry, store, _) = default_registry().await;
    let handle = registry.obtain("s1").await.unwrap();

    handle.append(Role::User, "hello").await.unwrap();

    let persisted = store.load("s1").await.unwrap().unwrap();
    assert_eq!(persisted.history.len(), 1);
    assert_eq!(persisted.history[0].content, "hello");
}

#[tokio::test]
async fn test_failed_persist_rolls_back_append() {
    let (registry, store, _) = default_registry().await;
    let handle = registry.obtain("s1").await.unwrap();

    handle.append(Role::User, "kept").await.unwrap();
    *store.fail_saves.lock() = true;

    let result = handle.append(Role::Assistant, "lost").await;
    assert!(matches!(result, Err(SessionError::Persistence(_))));

    let history = handle.history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content, "kept");
}

#[tokio::test]
async fn test_rate_limit_window() {
    let limits = SessionLimits {
        rate_limit_max: 3,
        rate_limit_window_ms: 50,
        ..Default::default()
    };
    let (registry, _, _) = registry_with(limits).await;
    let handle = registry.obtain("s1").await.unwrap();

    for _ in 0..3 {
        handle.check_rate().await.unwrap();
    }
    assert!(matches!(
        handle.check_rate().await,
        Err(SessionError::RateLimited { count: 4, max: 3 })
    ));

    // A fresh window admits again.
    tokio::time::sleep(std::time::Duration::from_millis(60)).await;
    handle.check_rate().await.unwrap();
}

#[tokio::test]
async fn test_rate_limit_is_per_session() {
    let limits = SessionLimits {
        rate_limit_max: 1,
        ..Default::default()
    };
    let (registry, _, _) = registry_with(limits).await;

    let a = registry.obtain("a").await.unwrap();
    let b = registry.obtain("b").await.unwrap();

    a.check_rate().await.unwrap();
    assert!(a.check_rate().await.is_err());
    b.check_rate().await.unwrap();
}

#[tokio::test]
async fn test_cart_action_ring_is_bounded() {
    let (registry, _, archive) = default_registry().await;
    let handle = registry.obtain("s1").await.unwrap();

    for i in 0..(CART_ACTION_CAPACITY + 5) {
        handle
            .log_cart_action("add", json!({ "merchandiseId": format!("m{i}") }))
            .await
            .unwrap();
    }

    let actions = handle.cart_actions().await.unwrap();
    assert_eq!(actions.len(), CART_ACTION_CAPACITY);
    // The oldest five were evicted.
    assert_eq!(actions[0].details, json!({ "merchandiseId": "m5" }));

    // Every action was still mirrored to the archive.
    let mirrored = archive.cart_action_count("s1").await.unwrap();
    assert_eq!(mirrored as usize, CART_ACTION_CAPACITY + 5);
}

#[tokio::test]
async fn test_set_cart_id_round_trip() {
    let (registry, store, _) = default_registry().await;
    let handle = registry.obtain("s1").await.unwrap();

    handle.set_cart_id("c1").await.unwrap();
    assert_eq!(handle.cart_id().await.unwrap().as_deref(), Some("c1"));

    let persisted = store.load("s1").await.unwrap().unwrap();
    assert_eq!(persisted.cart_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_end_archives_transcript_once() {
    let (registry, store, archive) = default_registry().await;
    let handle = registry.obtain("s1").await.unwrap();

    handle.append(Role::User, "hi").await.unwrap();
    handle.append(Role::Assistant, "hello!").await.unwrap();
    handle.append(Role::User, "bye").await.unwrap();

    registry.end("s1").await.unwrap();

    let conversations = archive.conversations_for_session("s1").await.unwrap();
    assert_eq!(conversations.len(), 1);

    let conversation = &conversations[0];
    assert!(conversation.started_at <= conversation.ended_at.unwrap());
    assert_eq!(conversation.messages.len(), 3);
    assert_eq!(
        conversation
            .messages
            .iter()
            .map(|m| m.role)
            .collect::<Vec<_>>(),
        vec![Role::User, Role::Assistant, Role::User]
    );

    // Durable copy cleared; a fresh actor starts empty.
    assert!(store.load("s1").await.unwrap().is_none());
    let fresh = registry.obtain("s1").await.unwrap();
    assert!(fresh.history().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_end_of_empty_session_writes_nothing() {
    let (registry, _, archive) = default_registry().await;
    registry.obtain("s1").await.unwrap();

    registry.end("s1").await.unwrap();

    let conversations = archive.conversations_for_session("s1").await.unwrap();
    assert!(conversations.is_empty());
}

#[tokio::test]
async fn test_ending_again_creates_second_archive_record() {
    let (registry, _, archive) = default_registry().await;

    let handle = registry.obtain("s1").await.unwrap();
    handle.append(Role::User, "first life").await.unwrap();
    registry.end("s1").await.unwrap();

    let handle = registry.obtain("s1").await.unwrap();
    handle.append(Role::User, "second life").await.unwrap();
    registry.end("s1").await.unwrap();

    let conversations = archive.conversations_for_session("s1").await.unwrap();
    assert_eq!(conversations.len(), 2);
    assert_eq!(conversations[0].messages[0].content, "first life");
    assert_eq!(conversations[1].messages[0].content, "second life");
}

#[tokio::test]
async fn test_history_overflow_spills_to_archive() {
    let limits = SessionLimits {
        max_history: 2,
        ..Default::default()
    };
    let (registry, _, archive) = registry_with(limits).await;
    let handle = registry.obtain("s1").await.unwrap();

    for i in 0..4 {
        handle.append(Role::User, format!("turn {i}")).await.unwrap();
    }

    let history = handle.history().await.unwrap();
    assert_eq!(
        history.iter().map(|e| e.content.as_str()).collect::<Vec<_>>(),
        vec!["turn 2", "turn 3"]
    );

    registry.end("s1").await.unwrap();

    // Spilled prefix plus in-memory suffix form the full transcript.
    let conversations = archive.conversations_for_session("s1").await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(
        conversations[0]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>(),
        vec!["turn 0", "turn 1", "turn 2", "turn 3"]
    );
}

#[tokio::test]
async fn test_sqlite_store_round_trip() {
    let pool = connect_pool("sqlite::memory:").await.unwrap();
    let store = SqliteSessionStore::new(pool);
    store.migrate().await.unwrap();

    assert!(store.load("s1").await.unwrap().is_none());

    let session = PersistedSession {
        session_id: "s1".to_string(),
        history: vec![HistoryEntry {
            role: Role::User,
            content: "hello".to_string(),
            timestamp: 1,
        }],
        cart_id: Some("c1".to_string()),
        cart_actions: vec![CartActionRecord {
            action: "add".to_string(),
            details: json!({"merchandiseId": "m1"}),
            timestamp: 2,
        }],
    };
    store.save(&session).await.unwrap();

    let loaded = store.load("s1").await.unwrap().unwrap();
    assert_eq!(loaded, session);

    store.clear("s1").await.unwrap();
    assert!(store.load("s1").await.unwrap().is_none());
}
