use tokio::time::{timeout, Duration};
use uuid::Uuid;

use chat_cell::services::rooms::{consultation_room, user_room, RoomRegistry};

#[test]
fn test_room_naming() {
    let id = Uuid::new_v4();
    assert_eq!(consultation_room(id), format!("consultation_{}", id));
    assert_eq!(user_room("abc"), "user_abc");
}

#[tokio::test]
async fn test_publish_reaches_all_subscribers() {
    let registry = RoomRegistry::new(16);
    let room = consultation_room(Uuid::new_v4());

    let mut rx1 = registry.subscribe(&room).await;
    let mut rx2 = registry.subscribe(&room).await;

    let delivered = registry.publish(&room, "hello".to_string()).await;
    assert_eq!(delivered, 2);

    let msg1 = timeout(Duration::from_millis(100), rx1.recv())
        .await
        .unwrap()
        .unwrap();
    let msg2 = timeout(Duration::from_millis(100), rx2.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(msg1, "hello");
    assert_eq!(msg2, "hello");
}

#[tokio::test]
async fn test_publish_to_unknown_room_is_noop() {
    let registry = RoomRegistry::new(16);
    let delivered = registry.publish("consultation_missing", "hello".to_string()).await;
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let registry = RoomRegistry::new(16);
    let room_a = consultation_room(Uuid::new_v4());
    let room_b = consultation_room(Uuid::new_v4());

    let mut rx_a = registry.subscribe(&room_a).await;
    let mut rx_b = registry.subscribe(&room_b).await;

    registry.publish(&room_a, "only-a".to_string()).await;

    let msg = timeout(Duration::from_millis(100), rx_a.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg, "only-a");

    // Nothing should arrive in room B.
    let nothing = timeout(Duration::from_millis(100), rx_b.recv()).await;
    assert!(nothing.is_err());
}

#[tokio::test]
async fn test_prune_removes_empty_rooms() {
    let registry = RoomRegistry::new(16);
    let room = consultation_room(Uuid::new_v4());

    {
        let _rx = registry.subscribe(&room).await;
        assert_eq!(registry.active_rooms().await.len(), 1);
    }

    // Receiver dropped; prune should clear the channel.
    registry.prune().await;
    assert!(registry.active_rooms().await.is_empty());
}

#[tokio::test]
async fn test_late_subscriber_misses_earlier_messages() {
    let registry = RoomRegistry::new(16);
    let room = consultation_room(Uuid::new_v4());

    let _early = registry.subscribe(&room).await;
    registry.publish(&room, "before".to_string()).await;

    let mut late = registry.subscribe(&room).await;
    registry.publish(&room, "after".to_string()).await;

    let msg = timeout(Duration::from_millis(100), late.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg, "after");
}
