// libs/consultation-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A telemedicine consultation between one patient and one doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub status: ConsultationStatus,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl ConsultationStatus {
    /// Terminal statuses admit no further lifecycle actions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::Completed
                | ConsultationStatus::Cancelled
                | ConsultationStatus::NoShow
        )
    }

    /// Active consultations occupy their doctor's calendar.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConsultationStatus::Scheduled | ConsultationStatus::InProgress
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::InProgress => "in_progress",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
            ConsultationStatus::NoShow => "no_show",
        }
    }
}

/// Lifecycle actions a caller can apply to a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Start,
    End,
    Cancel,
    MarkNoShow,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::End => "end",
            LifecycleAction::Cancel => "cancel",
            LifecycleAction::MarkNoShow => "mark_no_show",
        }
    }
}

/// The caller's relation to the consultation, derived per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Doctor,
    Patient,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsultationRequest {
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConsultationRequest {
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsultationSearchQuery {
    pub status: Option<ConsultationStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Not authorized to access this consultation")]
    Forbidden,

    #[error("Cannot {action} a {status} consultation")]
    InvalidTransition { status: String, action: String },

    #[error("Scheduling conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
