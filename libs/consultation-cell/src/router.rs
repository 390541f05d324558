// libs/consultation-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn consultation_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_consultation))
        .route("/", get(handlers::search_consultations))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .route("/{consultation_id}", put(handlers::update_consultation))
        .route("/{consultation_id}", delete(handlers::delete_consultation))
        .route("/{consultation_id}/start", post(handlers::start_consultation))
        .route("/{consultation_id}/end", post(handlers::end_consultation))
        .route("/{consultation_id}/cancel", post(handlers::cancel_consultation))
        .route("/{consultation_id}/no-show", post(handlers::mark_no_show))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
