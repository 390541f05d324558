// libs/chat-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use consultation_cell::models::{ConsultationStatus, LifecycleAction};

/// A persisted chat message within a consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Document,
    Audio,
    Video,
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::Text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub consultation_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
}

/// Absent `message_ids` means "everything unread addressed to me".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub consultation_id: Uuid,
    #[serde(default)]
    pub message_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
}

/// Events a connected client may send over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinConsultation {
        consultation_id: Uuid,
    },
    SendMessage {
        consultation_id: Uuid,
        content: String,
        #[serde(default)]
        message_type: MessageType,
    },
    MarkRead {
        consultation_id: Uuid,
        #[serde(default)]
        message_ids: Option<Vec<Uuid>>,
    },
    Typing {
        consultation_id: Uuid,
        is_typing: bool,
    },
    UpdateStatus {
        consultation_id: Uuid,
        action: LifecycleAction,
    },
}

/// Events the server fans out to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Joined {
        consultation_id: Uuid,
    },
    NewMessage {
        message: ChatMessage,
    },
    /// Truncated preview, sent to the receiver's private room when they are
    /// not present in the consultation room.
    MessageNotification {
        consultation_id: Uuid,
        sender_id: Uuid,
        preview: String,
    },
    MessagesRead {
        consultation_id: Uuid,
        message_ids: Vec<Uuid>,
        reader_id: Uuid,
    },
    Typing {
        consultation_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },
    StatusUpdated {
        consultation_id: Uuid,
        status: ConsultationStatus,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Consultation not found")]
    ConsultationNotFound,

    #[error("Not a participant of this consultation")]
    NotParticipant,

    #[error("Messages are only allowed while the consultation is scheduled or in progress")]
    ConsultationClosed,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
