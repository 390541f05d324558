// libs/chat-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;

use crate::services::presence::{InMemoryPresenceStore, PresenceStore};
use crate::services::rooms::RoomRegistry;

/// Shared realtime state: one room registry and one presence store for the
/// whole process, cloned into every handler.
#[derive(Clone)]
pub struct ChatState {
    pub config: Arc<AppConfig>,
    pub rooms: RoomRegistry,
    pub presence: Arc<dyn PresenceStore>,
}

impl ChatState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let rooms = RoomRegistry::new(config.chat_channel_capacity);
        Self {
            config,
            rooms,
            presence: InMemoryPresenceStore::new(),
        }
    }

    pub fn with_presence(config: Arc<AppConfig>, presence: Arc<dyn PresenceStore>) -> Self {
        let rooms = RoomRegistry::new(config.chat_channel_capacity);
        Self {
            config,
            rooms,
            presence,
        }
    }
}
