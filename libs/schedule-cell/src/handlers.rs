// libs/schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AvailabilityQuery, CreateScheduleRequest, ScheduleError, SlotsQuery, UpdateScheduleRequest,
};
use crate::services::availability::ScheduleService;

fn map_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::NotFound => AppError::NotFound("Schedule not found".to_string()),
        ScheduleError::Overlap => {
            AppError::Conflict("Schedule window overlaps an existing window".to_string())
        }
        ScheduleError::InvalidTimeRange(msg) => AppError::ValidationError(msg),
        ScheduleError::ValidationError(msg) => AppError::ValidationError(msg),
        ScheduleError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_schedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Doctors manage their own windows; admins may target any doctor.
    let doctor_id = match (user.is_admin(), request.doctor_id) {
        (true, Some(target)) => target,
        _ => {
            if !user.is_doctor() {
                return Err(AppError::Forbidden(
                    "Only doctors can create schedule windows".to_string(),
                ));
            }
            Uuid::parse_str(&user.id)
                .map_err(|_| AppError::BadRequest("Invalid doctor ID".to_string()))?
        }
    };

    let service = ScheduleService::new(&state);
    let schedule = service
        .create_schedule(doctor_id, request, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule window created",
        "data": schedule
    })))
}

#[axum::debug_handler]
pub async fn get_my_schedules(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let doctor_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid doctor ID".to_string()))?;

    let service = ScheduleService::new(&state);
    let schedules = service
        .get_doctor_schedules(doctor_id, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedules retrieved",
        "data": schedules
    })))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    let current = service
        .get_schedule(schedule_id, token)
        .await
        .map_err(map_error)?;

    let is_owner = current.doctor_id.to_string() == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to update this schedule".to_string(),
        ));
    }

    let schedule = service
        .update_schedule(schedule_id, request, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule window updated",
        "data": schedule
    })))
}

#[axum::debug_handler]
pub async fn delete_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    let current = service
        .get_schedule(schedule_id, token)
        .await
        .map_err(map_error)?;

    let is_owner = current.doctor_id.to_string() == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to delete this schedule".to_string(),
        ));
    }

    service
        .delete_schedule(schedule_id, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Schedule window deleted",
        "data": null
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    let slots = service
        .compute_slots(doctor_id, query.date, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Available slots computed",
        "data": {
            "doctor_id": doctor_id,
            "date": query.date,
            "slots": slots
        }
    })))
}

#[axum::debug_handler]
pub async fn check_doctor_availability(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ScheduleService::new(&state);

    let available = service
        .check_availability(doctor_id, query.start, query.end, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Availability checked",
        "data": {
            "doctor_id": doctor_id,
            "start": query.start,
            "end": query.end,
            "available": available
        }
    })))
}
