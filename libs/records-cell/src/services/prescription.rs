// libs/records-cell/src/services/prescription.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use consultation_cell::models::{Consultation, ConsultationStatus};
use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_models::auth::User;

use crate::models::{CreatePrescriptionRequest, Prescription, RecordsError};

pub struct PrescriptionService {
    supabase: SupabaseClient,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Issue a prescription. Only the consultation's doctor may do this, the
    /// consultation must be completed, and there can be at most one per
    /// consultation. A unique constraint on consultation_id backstops the
    /// duplicate check against racing requests.
    pub async fn create_prescription(
        &self,
        user: &User,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription, RecordsError> {
        if request.medication.trim().is_empty() || request.dosage.trim().is_empty() {
            return Err(RecordsError::ValidationError(
                "Medication and dosage are required".to_string(),
            ));
        }

        let consultation = self
            .load_consultation(request.consultation_id, auth_token)
            .await?;

        if consultation.doctor_id.to_string() != user.id && !user.is_admin() {
            return Err(RecordsError::Forbidden);
        }
        if consultation.status != ConsultationStatus::Completed {
            return Err(RecordsError::NotCompleted);
        }

        let existing: Vec<Prescription> = self
            .supabase
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/prescriptions?consultation_id=eq.{}",
                    request.consultation_id
                ),
                Some(auth_token),
                None,
            )
            .await
            .map_err(Self::map_db_error)?;
        if !existing.is_empty() {
            return Err(RecordsError::Duplicate);
        }

        let prescription_data = json!({
            "consultation_id": request.consultation_id,
            "doctor_id": consultation.doctor_id,
            "patient_id": consultation.patient_id,
            "medication": request.medication,
            "dosage": request.dosage,
            "instructions": request.instructions,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Prescription> = self
            .supabase
            .insert_returning("/rest/v1/prescriptions", Some(auth_token), prescription_data)
            .await
            .map_err(Self::map_db_error)?;

        let prescription = result.into_iter().next().ok_or_else(|| {
            RecordsError::DatabaseError("Failed to create prescription".to_string())
        })?;

        info!(
            "Prescription {} issued for consultation {}",
            prescription.id, request.consultation_id
        );
        Ok(prescription)
    }

    pub async fn get_prescription(
        &self,
        prescription_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Prescription, RecordsError> {
        let path = format!("/rest/v1/prescriptions?id=eq.{}", prescription_id);
        let result: Vec<Prescription> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        let prescription = result.into_iter().next().ok_or(RecordsError::NotFound)?;
        Self::check_participant(&prescription, user)?;
        Ok(prescription)
    }

    pub async fn for_consultation(
        &self,
        consultation_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, RecordsError> {
        let consultation = self.load_consultation(consultation_id, auth_token).await?;
        if consultation.patient_id.to_string() != user.id
            && consultation.doctor_id.to_string() != user.id
            && !user.is_admin()
        {
            return Err(RecordsError::Forbidden);
        }

        let path = format!(
            "/rest/v1/prescriptions?consultation_id=eq.{}&order=created_at.desc",
            consultation_id
        );
        let result: Vec<Prescription> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(result)
    }

    /// A patient's prescription history. Patients see their own; doctors and
    /// admins may look up any patient.
    pub async fn for_patient(
        &self,
        patient_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, RecordsError> {
        if patient_id.to_string() != user.id && !user.is_doctor() && !user.is_admin() {
            return Err(RecordsError::Forbidden);
        }

        let path = format!(
            "/rest/v1/prescriptions?patient_id=eq.{}&order=created_at.desc",
            patient_id
        );
        let result: Vec<Prescription> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        debug!("Found {} prescriptions for patient {}", result.len(), patient_id);
        Ok(result)
    }

    fn check_participant(prescription: &Prescription, user: &User) -> Result<(), RecordsError> {
        if prescription.patient_id.to_string() == user.id
            || prescription.doctor_id.to_string() == user.id
            || user.is_admin()
        {
            Ok(())
        } else {
            Err(RecordsError::Forbidden)
        }
    }

    async fn load_consultation(
        &self,
        consultation_id: Uuid,
        auth_token: &str,
    ) -> Result<Consultation, RecordsError> {
        let path = format!("/rest/v1/consultations?id=eq.{}", consultation_id);
        let result: Vec<Consultation> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        result
            .into_iter()
            .next()
            .ok_or(RecordsError::ConsultationNotFound)
    }

    fn map_db_error(e: DbError) -> RecordsError {
        match e {
            DbError::Conflict(_) => RecordsError::Duplicate,
            DbError::NotFound(_) => RecordsError::NotFound,
            other => RecordsError::DatabaseError(other.to_string()),
        }
    }
}
