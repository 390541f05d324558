use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use chat_cell::router::chat_routes;
use chat_cell::state::ChatState;
use consultation_cell::router::consultation_routes;
use records_cell::router::{prescription_routes, rating_routes};
use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    // One registry per process so REST handlers and sockets share rooms
    let chat_state = ChatState::new(state.clone());

    Router::new()
        .route("/", get(|| async { "Telemedicine API is running!" }))
        .nest("/consultations", consultation_routes(state.clone()))
        .nest("/schedules", schedule_routes(state.clone()))
        .nest("/chat", chat_routes(chat_state))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/ratings", rating_routes(state.clone()))
}
