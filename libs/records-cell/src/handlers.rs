// libs/records-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreatePrescriptionRequest, CreateRatingRequest, RecordsError};
use crate::services::prescription::PrescriptionService;
use crate::services::rating::RatingService;

fn map_error(e: RecordsError) -> AppError {
    match e {
        RecordsError::ConsultationNotFound => {
            AppError::NotFound("Consultation not found".to_string())
        }
        RecordsError::NotFound => AppError::NotFound("Record not found".to_string()),
        RecordsError::Forbidden => AppError::Forbidden("Not authorized for this record".to_string()),
        RecordsError::NotCompleted => AppError::ValidationError(e.to_string()),
        RecordsError::Duplicate => AppError::Conflict(e.to_string()),
        RecordsError::ValidationError(msg) => AppError::ValidationError(msg),
        RecordsError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_prescription(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescription = service
        .create_prescription(&user, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescription issued",
        "data": prescription
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(state): State<Arc<AppConfig>>,
    Path(prescription_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescription = service
        .get_prescription(prescription_id, &user, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescription retrieved",
        "data": prescription
    })))
}

#[axum::debug_handler]
pub async fn get_consultation_prescriptions(
    State(state): State<Arc<AppConfig>>,
    Path(consultation_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescriptions = service
        .for_consultation(consultation_id, &user, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescriptions retrieved",
        "data": prescriptions
    })))
}

#[axum::debug_handler]
pub async fn get_patient_prescriptions(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&state);
    let prescriptions = service
        .for_patient(patient_id, &user, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Prescriptions retrieved",
        "data": prescriptions
    })))
}

#[axum::debug_handler]
pub async fn create_rating(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRatingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = RatingService::new(&state);
    let rating = service
        .create_rating(&user, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Rating recorded",
        "data": rating
    })))
}

#[axum::debug_handler]
pub async fn get_rating(
    State(state): State<Arc<AppConfig>>,
    Path(rating_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = RatingService::new(&state);
    let rating = service
        .get_rating(rating_id, &user, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Rating retrieved",
        "data": rating
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_ratings(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = RatingService::new(&state);
    let summary = service
        .doctor_summary(doctor_id, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor ratings retrieved",
        "data": summary
    })))
}
