// libs/chat-cell/src/router.rs
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::socket;
use crate::state::ChatState;

pub fn chat_routes(state: ChatState) -> Router {
    // The socket endpoint authenticates via ?token=, not the middleware.
    let ws_routes = Router::new().route("/ws", get(socket::ws_handler));

    let protected_routes = Router::new()
        .route("/messages", post(handlers::send_message))
        .route("/messages/read", post(handlers::mark_messages_read))
        .route("/messages/unread-count", get(handlers::unread_count))
        .route(
            "/consultations/{consultation_id}/messages",
            get(handlers::get_messages),
        )
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(ws_routes)
        .merge(protected_routes)
        .with_state(state)
}
