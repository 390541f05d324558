// libs/chat-cell/src/services/rooms.rs
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

pub type RoomSender = broadcast::Sender<String>;
pub type RoomReceiver = broadcast::Receiver<String>;

pub fn consultation_room(consultation_id: Uuid) -> String {
    format!("consultation_{}", consultation_id)
}

pub fn user_room(user_id: &str) -> String {
    format!("user_{}", user_id)
}

/// Named broadcast channels, one per room. Channels are created lazily on
/// first subscribe and pruned once the last receiver is gone.
#[derive(Clone)]
pub struct RoomRegistry {
    channels: Arc<RwLock<HashMap<String, RoomSender>>>,
    capacity: usize,
}

impl RoomRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    pub async fn subscribe(&self, room: &str) -> RoomReceiver {
        let mut channels = self.channels.write().await;
        match channels.get(room) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(self.capacity);
                channels.insert(room.to_string(), sender);
                debug!("Created channel for room {}", room);
                receiver
            }
        }
    }

    /// Publish to a room, returning the number of receivers that got the
    /// message. An empty or unknown room is not an error; the message just
    /// has no audience.
    pub async fn publish(&self, room: &str, message: String) -> usize {
        let channels = self.channels.read().await;
        match channels.get(room) {
            Some(sender) => sender.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// Drop channels whose subscribers have all disconnected.
    pub async fn prune(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|room, sender| {
            let alive = sender.receiver_count() > 0;
            if !alive {
                debug!("Pruning empty room {}", room);
            }
            alive
        });
    }

    pub async fn active_rooms(&self) -> Vec<String> {
        let channels = self.channels.read().await;
        channels.keys().cloned().collect()
    }
}
