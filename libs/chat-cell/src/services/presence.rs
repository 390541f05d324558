// libs/chat-cell/src/services/presence.rs
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// One live socket connection for a user.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub connection_id: Uuid,
    pub role: String,
    pub rooms: HashSet<String>,
}

/// Tracks which users are connected and which rooms they have joined.
/// The trait boundary exists so the in-memory store can be swapped for a
/// shared one when the service runs on more than one node.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn register(&self, user_id: &str, role: &str) -> Uuid;
    async fn unregister(&self, user_id: &str);
    async fn join_room(&self, user_id: &str, room: &str);
    async fn leave_room(&self, user_id: &str, room: &str);
    async fn is_in_room(&self, user_id: &str, room: &str) -> bool;
    async fn is_online(&self, user_id: &str) -> bool;
    async fn rooms_of(&self, user_id: &str) -> Vec<String>;
}

#[derive(Default)]
pub struct InMemoryPresenceStore {
    sessions: RwLock<HashMap<String, SessionInfo>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl PresenceStore for InMemoryPresenceStore {
    async fn register(&self, user_id: &str, role: &str) -> Uuid {
        let connection_id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            user_id.to_string(),
            SessionInfo {
                connection_id,
                role: role.to_string(),
                rooms: HashSet::new(),
            },
        );
        debug!("Registered connection {} for user {}", connection_id, user_id);
        connection_id
    }

    async fn unregister(&self, user_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(user_id);
        debug!("Unregistered user {}", user_id);
    }

    async fn join_room(&self, user_id: &str, room: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(user_id) {
            session.rooms.insert(room.to_string());
        }
    }

    async fn leave_room(&self, user_id: &str, room: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(user_id) {
            session.rooms.remove(room);
        }
    }

    async fn is_in_room(&self, user_id: &str, room: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .get(user_id)
            .map(|s| s.rooms.contains(room))
            .unwrap_or(false)
    }

    async fn is_online(&self, user_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(user_id)
    }

    async fn rooms_of(&self, user_id: &str) -> Vec<String> {
        let sessions = self.sessions.read().await;
        sessions
            .get(user_id)
            .map(|s| s.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }
}
