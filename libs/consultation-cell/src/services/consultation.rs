// libs/consultation-cell/src/services/consultation.rs
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use schedule_cell::models::BookedSlot;
use schedule_cell::services::availability::{intervals_overlap, ScheduleService};
use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_models::auth::User;

use crate::models::{
    CallerRole, Consultation, ConsultationError, ConsultationSearchQuery, ConsultationStatus,
    CreateConsultationRequest, LifecycleAction, UpdateConsultationRequest,
};
use crate::services::lifecycle;

pub struct ConsultationService {
    supabase: SupabaseClient,
    schedule_service: ScheduleService,
}

impl ConsultationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            schedule_service: ScheduleService::new(config),
        }
    }

    /// Book a consultation. The slot must fall inside one of the doctor's
    /// availability windows and must not overlap any active consultation.
    /// A unique constraint on (doctor_id, scheduled_at) backstops the check:
    /// if two requests race, the second insert comes back as a conflict.
    pub async fn create_consultation(
        &self,
        patient_id: Uuid,
        request: CreateConsultationRequest,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        info!(
            "Booking consultation for patient {} with doctor {}",
            patient_id, request.doctor_id
        );

        if request.duration_minutes <= 0 {
            return Err(ConsultationError::ValidationError(
                "Duration must be positive".to_string(),
            ));
        }
        if request.scheduled_at <= Utc::now() {
            return Err(ConsultationError::ValidationError(
                "Consultation must be scheduled in the future".to_string(),
            ));
        }

        self.verify_doctor_exists(request.doctor_id, auth_token)
            .await?;

        let start = request.scheduled_at;
        let end = start + Duration::minutes(request.duration_minutes as i64);

        let available = self
            .schedule_service
            .check_availability(request.doctor_id, start, end, auth_token)
            .await
            .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;
        if !available {
            return Err(ConsultationError::Conflict(
                "Doctor is not available at the requested time".to_string(),
            ));
        }

        if self
            .has_overlapping_consultation(request.doctor_id, start, end, None, auth_token)
            .await?
        {
            return Err(ConsultationError::Conflict(
                "Doctor already has a consultation in this time range".to_string(),
            ));
        }

        let now = Utc::now();
        let consultation_data = json!({
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "status": ConsultationStatus::Scheduled.as_str(),
            "scheduled_at": start.to_rfc3339(),
            "duration_minutes": request.duration_minutes,
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Consultation> = self
            .supabase
            .insert_returning("/rest/v1/consultations", Some(auth_token), consultation_data)
            .await
            .map_err(Self::map_db_error)?;

        result.into_iter().next().ok_or_else(|| {
            ConsultationError::DatabaseError("Failed to create consultation".to_string())
        })
    }

    pub async fn get_consultation(
        &self,
        consultation_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.fetch_consultation(consultation_id, auth_token).await?;
        Self::caller_role(&consultation, user)?;
        Ok(consultation)
    }

    /// List consultations visible to the caller. Patients and doctors see
    /// their own; admins see everything.
    pub async fn search_consultations(
        &self,
        user: &User,
        query: ConsultationSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Consultation>, ConsultationError> {
        let mut path = "/rest/v1/consultations?order=scheduled_at.desc".to_string();

        if !user.is_admin() {
            let column = if user.is_doctor() { "doctor_id" } else { "patient_id" };
            path.push_str(&format!("&{}=eq.{}", column, user.id));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        if let Some(from) = query.from {
            path.push_str(&format!(
                "&scheduled_at=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = query.to {
            path.push_str(&format!(
                "&scheduled_at=lt.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }

        let result: Vec<Consultation> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(result)
    }

    /// Apply a lifecycle action. The status is re-read immediately before the
    /// write, so a stale client acting on an already-transitioned consultation
    /// gets an invalid-transition error instead of clobbering it.
    pub async fn apply_lifecycle_action(
        &self,
        consultation_id: Uuid,
        action: LifecycleAction,
        user: &User,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.fetch_consultation(consultation_id, auth_token).await?;
        let role = Self::caller_role(&consultation, user)?;

        let next = lifecycle::apply_action(consultation.status, action, role)?;

        let now = Utc::now();
        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(next.as_str()));
        update_data.insert("updated_at".to_string(), json!(now.to_rfc3339()));
        match action {
            LifecycleAction::Start => {
                update_data.insert("started_at".to_string(), json!(now.to_rfc3339()));
            }
            LifecycleAction::End => {
                update_data.insert("ended_at".to_string(), json!(now.to_rfc3339()));
            }
            _ => {}
        }

        info!(
            "Consultation {} transitioning {} -> {}",
            consultation_id,
            consultation.status.as_str(),
            next.as_str()
        );

        self.patch_consultation(consultation_id, Value::Object(update_data), auth_token)
            .await
    }

    /// Update consultation details. Rescheduling re-runs the availability and
    /// overlap checks against the new time.
    pub async fn update_consultation(
        &self,
        consultation_id: Uuid,
        request: UpdateConsultationRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let consultation = self.fetch_consultation(consultation_id, auth_token).await?;
        Self::caller_role(&consultation, user)?;

        if matches!(
            consultation.status,
            ConsultationStatus::Completed | ConsultationStatus::Cancelled
        ) {
            return Err(ConsultationError::InvalidTransition {
                status: consultation.status.as_str().to_string(),
                action: "update".to_string(),
            });
        }

        if let Some(duration) = request.duration_minutes {
            if duration <= 0 {
                return Err(ConsultationError::ValidationError(
                    "Duration must be positive".to_string(),
                ));
            }
        }

        let rescheduling = request.scheduled_at.is_some() || request.duration_minutes.is_some();
        if rescheduling {
            let new_start = request.scheduled_at.unwrap_or(consultation.scheduled_at);
            let new_duration = request
                .duration_minutes
                .unwrap_or(consultation.duration_minutes);
            let new_end = new_start + Duration::minutes(new_duration as i64);

            let available = self
                .schedule_service
                .check_availability(consultation.doctor_id, new_start, new_end, auth_token)
                .await
                .map_err(|e| ConsultationError::DatabaseError(e.to_string()))?;
            if !available {
                return Err(ConsultationError::Conflict(
                    "Doctor is not available at the requested time".to_string(),
                ));
            }

            if self
                .has_overlapping_consultation(
                    consultation.doctor_id,
                    new_start,
                    new_end,
                    Some(consultation_id),
                    auth_token,
                )
                .await?
            {
                return Err(ConsultationError::Conflict(
                    "Doctor already has a consultation in this time range".to_string(),
                ));
            }
        }

        let mut update_data = serde_json::Map::new();
        if let Some(scheduled_at) = request.scheduled_at {
            update_data.insert("scheduled_at".to_string(), json!(scheduled_at.to_rfc3339()));
        }
        if let Some(duration) = request.duration_minutes {
            update_data.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(diagnosis) = request.diagnosis {
            update_data.insert("diagnosis".to_string(), json!(diagnosis));
        }
        if let Some(prescription_text) = request.prescription_text {
            update_data.insert("prescription_text".to_string(), json!(prescription_text));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_consultation(consultation_id, Value::Object(update_data), auth_token)
            .await
    }

    /// Consultations can only be removed before they happen or after they
    /// were cancelled.
    pub async fn delete_consultation(
        &self,
        consultation_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<(), ConsultationError> {
        let consultation = self.fetch_consultation(consultation_id, auth_token).await?;
        Self::caller_role(&consultation, user)?;

        if !matches!(
            consultation.status,
            ConsultationStatus::Scheduled | ConsultationStatus::Cancelled
        ) {
            return Err(ConsultationError::InvalidTransition {
                status: consultation.status.as_str().to_string(),
                action: "delete".to_string(),
            });
        }

        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(Self::map_db_error)?;

        debug!("Deleted consultation {}", consultation_id);
        Ok(())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn fetch_consultation(
        &self,
        consultation_id: Uuid,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let result: Vec<Consultation> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        result.into_iter().next().ok_or(ConsultationError::NotFound)
    }

    fn caller_role(
        consultation: &Consultation,
        user: &User,
    ) -> Result<CallerRole, ConsultationError> {
        if user.is_admin() {
            return Ok(CallerRole::Admin);
        }
        if consultation.doctor_id.to_string() == user.id {
            return Ok(CallerRole::Doctor);
        }
        if consultation.patient_id.to_string() == user.id {
            return Ok(CallerRole::Patient);
        }
        warn!(
            "User {} is not a participant of consultation {}",
            user.id, consultation.id
        );
        Err(ConsultationError::Forbidden)
    }

    async fn verify_doctor_exists(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ConsultationError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        if result.is_empty() {
            return Err(ConsultationError::DoctorNotFound);
        }
        Ok(())
    }

    /// Check whether any active consultation for the doctor overlaps
    /// [start, end). The query widens the window by a day on each side so
    /// long-running bookings that start earlier are still caught.
    async fn has_overlapping_consultation(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<bool, ConsultationError> {
        let query_start = start - Duration::days(1);

        let mut path = format!(
            "/rest/v1/consultations?select=id,scheduled_at,duration_minutes,status&doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lt.{}&status=in.(scheduled,in_progress)",
            doctor_id,
            urlencoding::encode(&query_start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339())
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let candidates: Vec<BookedSlot> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(candidates
            .iter()
            .any(|b| intervals_overlap(start, end, b.scheduled_at, b.end_time())))
    }

    async fn patch_consultation(
        &self,
        consultation_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<Consultation, ConsultationError> {
        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let result: Vec<Consultation> = self
            .supabase
            .update_returning(&path, Some(auth_token), update_data)
            .await
            .map_err(Self::map_db_error)?;

        result.into_iter().next().ok_or(ConsultationError::NotFound)
    }

    fn map_db_error(e: DbError) -> ConsultationError {
        match e {
            DbError::Conflict(msg) => ConsultationError::Conflict(msg),
            DbError::NotFound(_) => ConsultationError::NotFound,
            other => ConsultationError::DatabaseError(other.to_string()),
        }
    }
}
