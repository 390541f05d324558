// libs/chat-cell/src/services/chat.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use consultation_cell::models::Consultation;
use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_models::auth::User;

use crate::models::{ChatError, ChatMessage, HistoryQuery, MessageType};

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const NOTIFICATION_PREVIEW_CHARS: usize = 80;

/// Build the truncated preview used for private notifications.
pub fn notification_preview(content: &str) -> String {
    if content.chars().count() <= NOTIFICATION_PREVIEW_CHARS {
        return content.to_string();
    }
    let truncated: String = content.chars().take(NOTIFICATION_PREVIEW_CHARS).collect();
    format!("{}...", truncated)
}

/// The other participant of a consultation, from the sender's point of view.
pub fn derive_receiver(consultation: &Consultation, sender_id: Uuid) -> Result<Uuid, ChatError> {
    if sender_id == consultation.patient_id {
        Ok(consultation.doctor_id)
    } else if sender_id == consultation.doctor_id {
        Ok(consultation.patient_id)
    } else {
        Err(ChatError::NotParticipant)
    }
}

pub struct ChatService {
    supabase: SupabaseClient,
}

impl ChatService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn load_consultation(
        &self,
        consultation_id: Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ChatError> {
        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let result: Vec<Consultation> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        result
            .into_iter()
            .next()
            .ok_or(ChatError::ConsultationNotFound)
    }

    /// Persist a message and return it together with the consultation it
    /// belongs to. Messaging is only open while the consultation is scheduled
    /// or in progress.
    pub async fn send_message(
        &self,
        consultation_id: Uuid,
        sender_id: Uuid,
        content: &str,
        message_type: MessageType,
        auth_token: &str,
    ) -> Result<(ChatMessage, Consultation), ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::ValidationError(
                "Message content cannot be empty".to_string(),
            ));
        }

        let consultation = self.load_consultation(consultation_id, auth_token).await?;
        let receiver_id = derive_receiver(&consultation, sender_id)?;

        if !consultation.status.is_active() {
            return Err(ChatError::ConsultationClosed);
        }

        let message_data = json!({
            "consultation_id": consultation_id,
            "sender_id": sender_id,
            "receiver_id": receiver_id,
            "content": content,
            "message_type": message_type,
            "is_read": false,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<ChatMessage> = self
            .supabase
            .insert_returning("/rest/v1/messages", Some(auth_token), message_data)
            .await
            .map_err(Self::map_db_error)?;

        let message = result.into_iter().next().ok_or_else(|| {
            ChatError::DatabaseError("Failed to persist message".to_string())
        })?;

        info!(
            "Message {} stored for consultation {}",
            message.id, consultation_id
        );
        Ok((message, consultation))
    }

    /// Load a consultation and verify the user is one of its participants.
    pub async fn ensure_participant(
        &self,
        consultation_id: Uuid,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ChatError> {
        let consultation = self.load_consultation(consultation_id, auth_token).await?;
        derive_receiver(&consultation, user_id)?;
        Ok(consultation)
    }

    /// Message history for a participant, newest first.
    pub async fn get_messages(
        &self,
        consultation_id: Uuid,
        user: &User,
        query: HistoryQuery,
        auth_token: &str,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let consultation = self.load_consultation(consultation_id, auth_token).await?;
        let user_id = Self::parse_user_id(user)?;
        derive_receiver(&consultation, user_id)?;

        let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 200);
        let mut path = format!(
            "/rest/v1/messages?consultation_id=eq.{}&order=created_at.desc&limit={}",
            consultation_id, limit
        );
        if let Some(before) = query.before {
            path.push_str(&format!(
                "&created_at=lt.{}",
                urlencoding::encode(&before.to_rfc3339())
            ));
        }

        let result: Vec<ChatMessage> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(result)
    }

    /// Mark messages as read. Only unread messages addressed to the reader
    /// within the given consultation are touched; without explicit ids the
    /// reader's whole unread backlog for the consultation is flipped. The
    /// ids actually updated are returned.
    pub async fn mark_read(
        &self,
        consultation_id: Uuid,
        message_ids: Option<&[Uuid]>,
        reader_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Uuid>, ChatError> {
        let mut path = format!(
            "/rest/v1/messages?consultation_id=eq.{}&receiver_id=eq.{}&is_read=eq.false",
            consultation_id, reader_id
        );
        if let Some(ids) = message_ids.filter(|ids| !ids.is_empty()) {
            let id_list = ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            path.push_str(&format!("&id=in.({})", id_list));
        }

        let updated: Vec<ChatMessage> = self
            .supabase
            .update_returning(&path, Some(auth_token), json!({ "is_read": true }))
            .await
            .map_err(Self::map_db_error)?;

        debug!(
            "Marked {} messages read for user {} in consultation {}",
            updated.len(),
            reader_id,
            consultation_id
        );
        Ok(updated.into_iter().map(|m| m.id).collect())
    }

    pub async fn unread_count(&self, user: &User, auth_token: &str) -> Result<usize, ChatError> {
        let path = format!(
            "/rest/v1/messages?receiver_id=eq.{}&is_read=eq.false&select=id",
            user.id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(result.len())
    }

    /// The ids of active consultations the user participates in, used to
    /// auto-subscribe a fresh socket connection.
    pub async fn active_consultation_ids(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Uuid>, ChatError> {
        let path = format!(
            "/rest/v1/consultations?select=id&or=(patient_id.eq.{id},doctor_id.eq.{id})&status=in.(scheduled,in_progress)",
            id = user.id
        );

        #[derive(serde::Deserialize)]
        struct IdRow {
            id: Uuid,
        }

        let result: Vec<IdRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(result.into_iter().map(|row| row.id).collect())
    }

    pub fn parse_user_id(user: &User) -> Result<Uuid, ChatError> {
        Uuid::parse_str(&user.id)
            .map_err(|_| ChatError::ValidationError("Invalid user ID".to_string()))
    }

    fn map_db_error(e: DbError) -> ChatError {
        match e {
            DbError::NotFound(_) => ChatError::ConsultationNotFound,
            other => ChatError::DatabaseError(other.to_string()),
        }
    }
}
