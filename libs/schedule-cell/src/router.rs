// libs/schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_schedule))
        .route("/", get(handlers::get_my_schedules))
        .route("/{schedule_id}", put(handlers::update_schedule))
        .route("/{schedule_id}", delete(handlers::delete_schedule))
        .route("/doctors/{doctor_id}/slots", get(handlers::get_doctor_slots))
        .route(
            "/doctors/{doctor_id}/availability",
            get(handlers::check_doctor_availability),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
