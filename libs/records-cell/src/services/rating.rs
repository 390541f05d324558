// libs/records-cell/src/services/rating.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use consultation_cell::models::{Consultation, ConsultationStatus};
use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_models::auth::User;

use crate::models::{CreateRatingRequest, DoctorRatingSummary, Rating, RecordsError};

/// Average of the given scores; 0.0 when there are none.
pub fn average_score(ratings: &[Rating]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i32 = ratings.iter().map(|r| r.score).sum();
    f64::from(sum) / ratings.len() as f64
}

pub struct RatingService {
    supabase: SupabaseClient,
}

impl RatingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Rate a completed consultation. Only its patient may rate, exactly once;
    /// the unique constraint on consultation_id backstops concurrent attempts.
    pub async fn create_rating(
        &self,
        user: &User,
        request: CreateRatingRequest,
        auth_token: &str,
    ) -> Result<Rating, RecordsError> {
        if !(1..=5).contains(&request.score) {
            return Err(RecordsError::ValidationError(
                "Score must be between 1 and 5".to_string(),
            ));
        }

        let consultation = self
            .load_consultation(request.consultation_id, auth_token)
            .await?;

        if consultation.patient_id.to_string() != user.id {
            return Err(RecordsError::Forbidden);
        }
        if consultation.status != ConsultationStatus::Completed {
            return Err(RecordsError::NotCompleted);
        }

        let existing: Vec<Rating> = self
            .supabase
            .request(
                Method::GET,
                &format!(
                    "/rest/v1/ratings?consultation_id=eq.{}",
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

        let rating_data = json!({
            "consultation_id": request.consultation_id,
            "patient_id": consultation.patient_id,
            "doctor_id": consultation.doctor_id,
            "score": request.score,
            "comment": request.comment,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Rating> = self
            .supabase
            .insert_returning("/rest/v1/ratings", Some(auth_token), rating_data)
            .await
            .map_err(Self::map_db_error)?;

        let rating = result
            .into_iter()
            .next()
            .ok_or_else(|| RecordsError::DatabaseError("Failed to create rating".to_string()))?;

        info!(
            "Rating {} ({} stars) recorded for consultation {}",
            rating.id, rating.score, request.consultation_id
        );
        Ok(rating)
    }

    pub async fn get_rating(
        &self,
        rating_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Rating, RecordsError> {
        let path = format!("/rest/v1/ratings?id=eq.{}", rating_id);
        let result: Vec<Rating> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        let rating = result.into_iter().next().ok_or(RecordsError::NotFound)?;
        if rating.patient_id.to_string() != user.id
            && rating.doctor_id.to_string() != user.id
            && !user.is_admin()
        {
            return Err(RecordsError::Forbidden);
        }
        Ok(rating)
    }

    /// All ratings for a doctor plus their average, visible to any
    /// authenticated user.
    pub async fn doctor_summary(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorRatingSummary, RecordsError> {
        let path = format!(
            "/rest/v1/ratings?doctor_id=eq.{}&order=created_at.desc",
            doctor_id
        );
        let ratings: Vec<Rating> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(DoctorRatingSummary {
            doctor_id,
            average_score: average_score(&ratings),
            total_ratings: ratings.len(),
            ratings,
        })
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
