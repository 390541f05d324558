// libs/chat-cell/src/socket.rs
use std::collections::HashSet;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use consultation_cell::services::consultation::ConsultationService;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::jwt::validate_token;

use crate::models::{ClientEvent, ServerEvent};
use crate::services::chat::{derive_receiver, notification_preview, ChatService};
use crate::services::rooms::{consultation_room, user_room, RoomReceiver};
use crate::state::ChatState;

const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Upgrade to a WebSocket connection. Browsers cannot set an Authorization
/// header on the upgrade request, so the JWT arrives as a query parameter and
/// is validated before the upgrade completes.
#[axum::debug_handler]
pub async fn ws_handler(
    State(state): State<ChatState>,
    Query(query): Query<WsQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    // Credential problems take precedence over handshake problems.
    let user = validate_token(&query.token, &state.config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;
    let ws = ws.map_err(|e| AppError::BadRequest(e.to_string()))?;

    let token = query.token.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user, token)))
}

async fn handle_socket(socket: WebSocket, state: ChatState, user: User, token: String) {
    let user_id = user.id.clone();
    let role = user.role.clone().unwrap_or_else(|| "patient".to_string());

    let connection_id = state.presence.register(&user_id, &role).await;
    info!("User {} connected (connection {})", user_id, connection_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);

    // Single writer for the socket; everything funnels through the channel.
    let send_task: JoinHandle<()> = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(Message::Text(message.into())).await.is_err() {
                break;
            }
        }
    });

    let mut subscribed: HashSet<String> = HashSet::new();
    let mut room_tasks: Vec<JoinHandle<()>> = Vec::new();

    // Every connection listens on its private room for notifications.
    let private_room = user_room(&user_id);
    let receiver = state.rooms.subscribe(&private_room).await;
    state.presence.join_room(&user_id, &private_room).await;
    subscribed.insert(private_room);
    room_tasks.push(spawn_room_forwarder(receiver, tx.clone()));

    // Auto-subscribe to the consultation rooms of active consultations.
    let chat = ChatService::new(&state.config);
    match chat.active_consultation_ids(&user, &token).await {
        Ok(ids) => {
            for id in ids {
                let room = consultation_room(id);
                if subscribed.insert(room.clone()) {
                    let receiver = state.rooms.subscribe(&room).await;
                    state.presence.join_room(&user_id, &room).await;
                    room_tasks.push(spawn_room_forwarder(receiver, tx.clone()));
                }
            }
        }
        Err(e) => warn!("Failed to auto-subscribe user {}: {}", user_id, e),
    }

    while let Some(Ok(message)) = ws_receiver.next().await {
        match message {
            Message::Text(text) => {
                let result = handle_client_event(
                    &state,
                    &chat,
                    &user,
                    &token,
                    text.as_str(),
                    &tx,
                    &mut subscribed,
                    &mut room_tasks,
                )
                .await;

                if let Err(error_message) = result {
                    send_event(&tx, &ServerEvent::Error { message: error_message }).await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Connection is gone; tear everything down.
    send_task.abort();
    for task in &room_tasks {
        task.abort();
    }
    state.presence.unregister(&user_id).await;
    state.rooms.prune().await;
    info!("User {} disconnected (connection {})", user_id, connection_id);
}

#[allow(clippy::too_many_arguments)]
async fn handle_client_event(
    state: &ChatState,
    chat: &ChatService,
    user: &User,
    token: &str,
    raw: &str,
    tx: &mpsc::Sender<String>,
    subscribed: &mut HashSet<String>,
    room_tasks: &mut Vec<JoinHandle<()>>,
) -> Result<(), String> {
    let event: ClientEvent =
        serde_json::from_str(raw).map_err(|e| format!("Malformed event: {}", e))?;

    let user_id = ChatService::parse_user_id(user).map_err(|e| e.to_string())?;

    match event {
        ClientEvent::JoinConsultation { consultation_id } => {
            chat.ensure_participant(consultation_id, user_id, token)
                .await
                .map_err(|e| e.to_string())?;

            let room = consultation_room(consultation_id);
            state.presence.join_room(&user.id, &room).await;
            if subscribed.insert(room.clone()) {
                let receiver = state.rooms.subscribe(&room).await;
                room_tasks.push(spawn_room_forwarder(receiver, tx.clone()));
            }

            send_event(tx, &ServerEvent::Joined { consultation_id }).await;
        }

        ClientEvent::SendMessage {
            consultation_id,
            content,
            message_type,
        } => {
            let (message, consultation) = chat
                .send_message(consultation_id, user_id, &content, message_type, token)
                .await
                .map_err(|e| e.to_string())?;

            let receiver_id =
                derive_receiver(&consultation, user_id).map_err(|e| e.to_string())?;
            let room = consultation_room(consultation_id);

            let preview = notification_preview(&message.content);
            state
                .rooms
                .publish(&room, encode(&ServerEvent::NewMessage { message }))
                .await;

            // Receiver not watching the room gets a private heads-up instead.
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
                            consultation_id,
                            sender_id: user_id,
                            preview,
                        }),
                    )
                    .await;
            }
        }

        ClientEvent::MarkRead {
            consultation_id,
            message_ids,
        } => {
            let marked = chat
                .mark_read(consultation_id, message_ids.as_deref(), user_id, token)
                .await
                .map_err(|e| e.to_string())?;

            if !marked.is_empty() {
                state
                    .rooms
                    .publish(
                        &consultation_room(consultation_id),
                        encode(&ServerEvent::MessagesRead {
                            consultation_id,
                            message_ids: marked,
                            reader_id: user_id,
                        }),
                    )
                    .await;
            }
        }

        ClientEvent::Typing {
            consultation_id,
            is_typing,
        } => {
            chat.ensure_participant(consultation_id, user_id, token)
                .await
                .map_err(|e| e.to_string())?;

            // Ephemeral; fan out without persisting.
            state
                .rooms
                .publish(
                    &consultation_room(consultation_id),
                    encode(&ServerEvent::Typing {
                        consultation_id,
                        user_id,
                        is_typing,
                    }),
                )
                .await;
        }

        ClientEvent::UpdateStatus {
            consultation_id,
            action,
        } => {
            let service = ConsultationService::new(&state.config);
            let updated = service
                .apply_lifecycle_action(consultation_id, action, user, token)
                .await
                .map_err(|e| e.to_string())?;

            state
                .rooms
                .publish(
                    &consultation_room(consultation_id),
                    encode(&ServerEvent::StatusUpdated {
                        consultation_id,
                        status: updated.status,
                    }),
                )
                .await;
        }
    }

    Ok(())
}

fn spawn_room_forwarder(mut receiver: RoomReceiver, tx: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    if tx.send(message).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Slow consumer dropped {} room messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn encode(event: &ServerEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

async fn send_event(tx: &mpsc::Sender<String>, event: &ServerEvent) {
    if tx.send(encode(event)).await.is_err() {
        debug!("Connection closed before event could be delivered");
    }
}
