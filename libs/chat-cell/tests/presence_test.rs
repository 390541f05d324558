use chat_cell::services::presence::{InMemoryPresenceStore, PresenceStore};

#[tokio::test]
async fn test_register_and_unregister() {
    let store = InMemoryPresenceStore::new();

    assert!(!store.is_online("user-1").await);

    store.register("user-1", "patient").await;
    assert!(store.is_online("user-1").await);

    store.unregister("user-1").await;
    assert!(!store.is_online("user-1").await);
}

#[tokio::test]
async fn test_join_and_leave_rooms() {
    let store = InMemoryPresenceStore::new();
    store.register("user-1", "doctor").await;

    store.join_room("user-1", "consultation_abc").await;
    store.join_room("user-1", "user_user-1").await;

    assert!(store.is_in_room("user-1", "consultation_abc").await);
    assert_eq!(store.rooms_of("user-1").await.len(), 2);

    store.leave_room("user-1", "consultation_abc").await;
    assert!(!store.is_in_room("user-1", "consultation_abc").await);
}

#[tokio::test]
async fn test_join_room_requires_registration() {
    let store = InMemoryPresenceStore::new();

    // Joining without a session is silently ignored.
    store.join_room("ghost", "consultation_abc").await;
    assert!(!store.is_in_room("ghost", "consultation_abc").await);
}

#[tokio::test]
async fn test_unregister_clears_rooms() {
    let store = InMemoryPresenceStore::new();
    store.register("user-1", "patient").await;
    store.join_room("user-1", "consultation_abc").await;

    store.unregister("user-1").await;

    assert!(!store.is_in_room("user-1", "consultation_abc").await);
    assert!(store.rooms_of("user-1").await.is_empty());
}

#[tokio::test]
async fn test_reconnect_replaces_session() {
    let store = InMemoryPresenceStore::new();

    let first = store.register("user-1", "patient").await;
    store.join_room("user-1", "consultation_abc").await;

    // A reconnect registers a new connection and drops the old room set.
    let second = store.register("user-1", "patient").await;

    assert_ne!(first, second);
    assert!(!store.is_in_room("user-1", "consultation_abc").await);
}
