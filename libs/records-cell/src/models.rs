// libs/records-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A prescription issued by the doctor of a completed consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub consultation_id: Uuid,
    pub medication: String,
    pub dosage: String,
    pub instructions: Option<String>,
}

/// A patient's rating of a completed consultation. One per consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRatingRequest {
    pub consultation_id: Uuid,
    pub score: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorRatingSummary {
    pub doctor_id: Uuid,
    pub average_score: f64,
    pub total_ratings: usize,
    pub ratings: Vec<Rating>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("Consultation not found")]
    ConsultationNotFound,

    #[error("Record not found")]
    NotFound,

    #[error("Not authorized for this record")]
    Forbidden,

    #[error("Consultation must be completed first")]
    NotCompleted,

    #[error("A record already exists for this consultation")]
    Duplicate,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
