// libs/consultation-cell/src/handlers.rs
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
    ConsultationError, ConsultationSearchQuery, CreateConsultationRequest, LifecycleAction,
    UpdateConsultationRequest,
};
use crate::services::consultation::ConsultationService;

fn map_error(e: ConsultationError) -> AppError {
    match e {
        ConsultationError::NotFound => AppError::NotFound("Consultation not found".to_string()),
        ConsultationError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        ConsultationError::Forbidden => {
            AppError::Forbidden("Not authorized for this consultation".to_string())
        }
        ConsultationError::InvalidTransition { .. } => AppError::ValidationError(e.to_string()),
        ConsultationError::Conflict(msg) => AppError::Conflict(msg),
        ConsultationError::ValidationError(msg) => AppError::ValidationError(msg),
        ConsultationError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_consultation(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // The patient identity always comes from the token, never the body.
    if !user.is_patient() && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only patients can book consultations".to_string(),
        ));
    }
    let patient_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid patient ID".to_string()))?;

    let service = ConsultationService::new(&state);
    let consultation = service
        .create_consultation(patient_id, request, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Consultation booked",
        "data": consultation
    })))
}

#[axum::debug_handler]
pub async fn get_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .get_consultation(consultation_id, &user, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Consultation retrieved",
        "data": consultation
    })))
}

#[axum::debug_handler]
pub async fn search_consultations(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<ConsultationSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultations = service
        .search_consultations(&user, query, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Consultations retrieved",
        "data": {
            "total": consultations.len(),
            "consultations": consultations
        }
    })))
}

#[axum::debug_handler]
pub async fn update_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateConsultationRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    let consultation = service
        .update_consultation(consultation_id, request, &user, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Consultation updated",
        "data": consultation
    })))
}

#[axum::debug_handler]
pub async fn delete_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = ConsultationService::new(&state);

    service
        .delete_consultation(consultation_id, &user, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Consultation deleted",
        "data": null
    })))
}

async fn lifecycle_handler(
    state: Arc<AppConfig>,
    consultation_id: Uuid,
    action: LifecycleAction,
    user: User,
    token: &str,
    message: &str,
) -> Result<Json<Value>, AppError> {
    let service = ConsultationService::new(&state);
    let consultation = service
        .apply_lifecycle_action(consultation_id, action, &user, token)
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": consultation
    })))
}

#[axum::debug_handler]
pub async fn start_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    lifecycle_handler(
        state,
        consultation_id,
        LifecycleAction::Start,
        user,
        auth.token(),
        "Consultation started",
    )
    .await
}

#[axum::debug_handler]
pub async fn end_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    lifecycle_handler(
        state,
        consultation_id,
        LifecycleAction::End,
        user,
        auth.token(),
        "Consultation completed",
    )
    .await
}

#[axum::debug_handler]
pub async fn cancel_consultation(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    lifecycle_handler(
        state,
        consultation_id,
        LifecycleAction::Cancel,
        user,
        auth.token(),
        "Consultation cancelled",
    )
    .await
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    lifecycle_handler(
        state,
        consultation_id,
        LifecycleAction::MarkNoShow,
        user,
        auth.token(),
        "Consultation marked as no-show",
    )
    .await
}
