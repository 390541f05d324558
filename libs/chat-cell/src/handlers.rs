// libs/chat-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{ChatError, HistoryQuery, MarkReadRequest, SendMessageRequest, ServerEvent};
use crate::services::chat::{derive_receiver, notification_preview, ChatService};
use crate::services::rooms::{consultation_room, user_room};
use crate::state::ChatState;

fn map_error(e: ChatError) -> AppError {
    match e {
        ChatError::ConsultationNotFound => AppError::NotFound("Consultation not found".to_string()),
        ChatError::NotParticipant => {
            AppError::Forbidden("Not a participant of this consultation".to_string())
        }
        ChatError::ConsultationClosed => AppError::ValidationError(e.to_string()),
        ChatError::ValidationError(msg) => AppError::ValidationError(msg),
        ChatError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn encode(event: &ServerEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

/// REST fallback for sending a message. Fans out to the same rooms as the
/// socket path, so clients on either transport stay in sync.
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<ChatState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let sender_id = ChatService::parse_user_id(&user).map_err(map_error)?;

    let chat = ChatService::new(&state.config);
    let (message, consultation) = chat
        .send_message(
            request.consultation_id,
            sender_id,
            &request.content,
            request.message_type,
            token,
        )
        .await
        .map_err(map_error)?;

    let receiver_id = derive_receiver(&consultation, sender_id).map_err(map_error)?;
    let room = consultation_room(request.consultation_id);
    let preview = notification_preview(&message.content);

    state
        .rooms
        .publish(
            &room,
            encode(&ServerEvent::NewMessage {
                message: message.clone(),
            }),
        )
        .await;

    let receiver_in_room = state
        .presence
        .is_in_room(&receiver_id.to_string(), &room)
        .await;
    if !receiver_in_room {
        state
            .rooms
            .publish(
                &user_room(&receiver_id.to_string()),
                encode(&ServerEvent::MessageNotification {
                    consultation_id: request.consultation_id,
                    sender_id,
                    preview,
                }),
            )
            .await;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Message sent",
        "data": message
    })))
}

#[axum::debug_handler]
pub async fn get_messages(
    State(state): State<ChatState>,
    Path(consultation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let chat = ChatService::new(&state.config);

    let messages = chat
        .get_messages(consultation_id, &user, query, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Messages retrieved",
        "data": {
            "consultation_id": consultation_id,
            "total": messages.len(),
            "messages": messages
        }
    })))
}

#[axum::debug_handler]
pub async fn mark_messages_read(
    State(state): State<ChatState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<MarkReadRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let reader_id = ChatService::parse_user_id(&user).map_err(map_error)?;

    let chat = ChatService::new(&state.config);
    let marked = chat
        .mark_read(
            request.consultation_id,
            request.message_ids.as_deref(),
            reader_id,
            token,
        )
        .await
        .map_err(map_error)?;

    if !marked.is_empty() {
        state
            .rooms
            .publish(
                &consultation_room(request.consultation_id),
                encode(&ServerEvent::MessagesRead {
                    consultation_id: request.consultation_id,
                    message_ids: marked.clone(),
                    reader_id,
                }),
            )
            .await;
    }

    Ok(Json(json!({
        "success": true,
        "message": "Messages marked as read",
        "data": { "marked": marked }
    })))
}

#[axum::debug_handler]
pub async fn unread_count(
    State(state): State<ChatState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let chat = ChatService::new(&state.config);

    let count = chat.unread_count(&user, token).await.map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Unread count retrieved",
        "data": { "unread": count }
    })))
}
