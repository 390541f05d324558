// libs/schedule-cell/src/services/availability.rs
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

use crate::models::{
    BookedSlot, CreateScheduleRequest, Schedule, ScheduleError, Slot, UpdateScheduleRequest,
};

/// Map a chrono weekday to the 0 = Sunday .. 6 = Saturday index used by the
/// schedules table.
pub fn day_index(weekday: Weekday) -> i32 {
    match weekday {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// Tile a window into contiguous, non-overlapping slots of `duration_minutes`.
/// Emits [t, t + duration) while the slot still fits inside the window, so a
/// window of length L yields exactly floor(L / D) slots.
pub fn tile_slots(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    duration_minutes: i32,
) -> Vec<Slot> {
    let mut slots = Vec::new();
    if duration_minutes <= 0 {
        return slots;
    }

    let duration = Duration::minutes(duration_minutes as i64);
    let mut current = window_start;

    while current + duration <= window_end {
        slots.push(Slot {
            start_time: current,
            end_time: current + duration,
            duration_minutes,
        });
        current += duration;
    }

    slots
}

/// Two half-open intervals overlap iff start1 < end2 && start2 < end1.
pub fn intervals_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}

fn times_overlap(start1: NaiveTime, end1: NaiveTime, start2: NaiveTime, end2: NaiveTime) -> bool {
    start1 < end2 && start2 < end1
}

pub struct ScheduleService {
    supabase: SupabaseClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a weekly availability window. Overlapping windows for the same
    /// doctor and day are rejected with `Overlap`.
    pub async fn create_schedule(
        &self,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
        auth_token: &str,
    ) -> Result<Schedule, ScheduleError> {
        debug!("Creating schedule window for doctor {}", doctor_id);

        Self::validate_window(request.day_of_week, request.start_time, request.end_time)?;
        if request.consultation_duration <= 0 {
            return Err(ScheduleError::ValidationError(
                "Consultation duration must be positive".to_string(),
            ));
        }

        self.check_window_overlap(
            doctor_id,
            request.day_of_week,
            request.start_time,
            request.end_time,
            None,
            auth_token,
        )
        .await?;

        let now = Utc::now();
        let schedule_data = json!({
            "doctor_id": doctor_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "is_available": true,
            "consultation_duration": request.consultation_duration,
            "max_patients": request.max_patients.unwrap_or(1),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Schedule> = self
            .supabase
            .insert_returning("/rest/v1/schedules", Some(auth_token), schedule_data)
            .await
            .map_err(Self::map_db_error)?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::DatabaseError("Failed to create schedule".to_string()))
    }

    pub async fn update_schedule(
        &self,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
        auth_token: &str,
    ) -> Result<Schedule, ScheduleError> {
        debug!("Updating schedule window {}", schedule_id);

        let current = self.get_schedule(schedule_id, auth_token).await?;

        let new_start = request.start_time.unwrap_or(current.start_time);
        let new_end = request.end_time.unwrap_or(current.end_time);
        Self::validate_window(current.day_of_week, new_start, new_end)?;

        if request.start_time.is_some() || request.end_time.is_some() {
            self.check_window_overlap(
                current.doctor_id,
                current.day_of_week,
                new_start,
                new_end,
                Some(schedule_id),
                auth_token,
            )
            .await?;
        }

        let mut update_data = serde_json::Map::new();
        if let Some(start_time) = request.start_time {
            update_data.insert(
                "start_time".to_string(),
                json!(start_time.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(end_time) = request.end_time {
            update_data.insert(
                "end_time".to_string(),
                json!(end_time.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(is_available) = request.is_available {
            update_data.insert("is_available".to_string(), json!(is_available));
        }
        if let Some(duration) = request.consultation_duration {
            if duration <= 0 {
                return Err(ScheduleError::ValidationError(
                    "Consultation duration must be positive".to_string(),
                ));
            }
            update_data.insert("consultation_duration".to_string(), json!(duration));
        }
        if let Some(max_patients) = request.max_patients {
            update_data.insert("max_patients".to_string(), json!(max_patients));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/schedules?id=eq.{}", schedule_id);
        let result: Vec<Schedule> = self
            .supabase
            .update_returning(&path, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(Self::map_db_error)?;

        result.into_iter().next().ok_or(ScheduleError::NotFound)
    }

    pub async fn delete_schedule(
        &self,
        schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        debug!("Deleting schedule window {}", schedule_id);

        let path = format!("/rest/v1/schedules?id=eq.{}", schedule_id);
        self.supabase
            .delete(&path, Some(auth_token))
            .await
            .map_err(Self::map_db_error)?;

        Ok(())
    }

    pub async fn get_schedule(
        &self,
        schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<Schedule, ScheduleError> {
        let path = format!("/rest/v1/schedules?id=eq.{}", schedule_id);
        let result: Vec<Schedule> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        result.into_iter().next().ok_or(ScheduleError::NotFound)
    }

    pub async fn get_doctor_schedules(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Schedule>, ScheduleError> {
        let path = format!(
            "/rest/v1/schedules?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        let result: Vec<Schedule> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(result)
    }

    /// Compute the concrete bookable slots for a doctor on a date: every
    /// available window for that weekday is tiled into duration-sized slots,
    /// and slots already occupied by an active consultation are dropped.
    /// Recomputed fresh on every call.
    pub async fn compute_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Slot>, ScheduleError> {
        debug!("Computing slots for doctor {} on {}", doctor_id, date);

        let day = day_index(date.weekday());
        let windows = self
            .get_available_windows(doctor_id, day, auth_token)
            .await?;

        if windows.is_empty() {
            return Ok(vec![]);
        }

        let booked = self
            .get_active_bookings_for_date(doctor_id, date, auth_token)
            .await?;

        let mut slots = Vec::new();
        for window in &windows {
            let window_start = date.and_time(window.start_time).and_utc();
            let window_end = date.and_time(window.end_time).and_utc();

            for slot in tile_slots(window_start, window_end, window.consultation_duration) {
                let occupied = booked.iter().any(|b| {
                    intervals_overlap(slot.start_time, slot.end_time, b.scheduled_at, b.end_time())
                });
                if !occupied {
                    slots.push(slot);
                }
            }
        }

        slots.sort_by(|a, b| a.start_time.cmp(&b.start_time));

        debug!("Found {} open slots", slots.len());
        Ok(slots)
    }

    /// True only when both conditions hold: the requested range falls inside
    /// an available schedule window for that weekday, and no active
    /// consultation for the doctor starts within [start, end).
    pub async fn check_availability(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool, ScheduleError> {
        if end <= start {
            return Err(ScheduleError::InvalidTimeRange(
                "End must be after start".to_string(),
            ));
        }
        // Windows are per-day; a range crossing midnight can never fit one.
        if end.date_naive() != start.date_naive() {
            debug!(
                "Requested range {} - {} crosses a day boundary",
                start, end
            );
            return Ok(false);
        }

        let day = day_index(start.date_naive().weekday());
        let windows = self
            .get_available_windows(doctor_id, day, auth_token)
            .await?;

        let start_tod = start.time();
        let end_tod = end.time();
        let in_window = windows.iter().any(|w| {
            w.start_time <= start_tod && start_tod < w.end_time && end_tod <= w.end_time
        });

        if !in_window {
            debug!(
                "Doctor {} has no available window covering {} - {}",
                doctor_id, start, end
            );
            return Ok(false);
        }

        let occupied = self
            .has_active_booking_in_range(doctor_id, start, end, auth_token)
            .await?;

        if occupied {
            warn!(
                "Doctor {} already booked within {} - {}",
                doctor_id, start, end
            );
        }

        Ok(!occupied)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    fn validate_window(
        day_of_week: i32,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<(), ScheduleError> {
        if !(0..=6).contains(&day_of_week) {
            return Err(ScheduleError::ValidationError(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }
        if start_time >= end_time {
            return Err(ScheduleError::InvalidTimeRange(
                "Start time must be before end time".to_string(),
            ));
        }
        Ok(())
    }

    async fn check_window_overlap(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        start_time: NaiveTime,
        end_time: NaiveTime,
        exclude_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        let mut path = format!(
            "/rest/v1/schedules?doctor_id=eq.{}&day_of_week=eq.{}",
            doctor_id, day_of_week
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<Schedule> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        for window in existing {
            if times_overlap(start_time, end_time, window.start_time, window.end_time) {
                return Err(ScheduleError::Overlap);
            }
        }

        Ok(())
    }

    async fn get_available_windows(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Vec<Schedule>, ScheduleError> {
        let path = format!(
            "/rest/v1/schedules?doctor_id=eq.{}&day_of_week=eq.{}&is_available=eq.true&order=start_time.asc",
            doctor_id, day_of_week
        );

        let result: Vec<Schedule> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(result)
    }

    async fn get_active_bookings_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BookedSlot>, ScheduleError> {
        let start_of_day = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
        let end_of_day = date.and_hms_opt(23, 59, 59).unwrap_or_default().and_utc();

        let path = format!(
            "/rest/v1/consultations?select=scheduled_at,duration_minutes,status&doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&status=in.(scheduled,in_progress)",
            doctor_id,
            urlencoding::encode(&start_of_day.to_rfc3339()),
            urlencoding::encode(&end_of_day.to_rfc3339())
        );

        let result: Vec<BookedSlot> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(result)
    }

    async fn has_active_booking_in_range(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<bool, ScheduleError> {
        let path = format!(
            "/rest/v1/consultations?select=scheduled_at,duration_minutes,status&doctor_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lt.{}&status=in.(scheduled,in_progress)",
            doctor_id,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339())
        );

        let result: Vec<BookedSlot> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(Self::map_db_error)?;

        Ok(!result.is_empty())
    }

    fn map_db_error(e: DbError) -> ScheduleError {
        match e {
            DbError::Conflict(_) => ScheduleError::Overlap,
            DbError::NotFound(_) => ScheduleError::NotFound,
            other => ScheduleError::DatabaseError(other.to_string()),
        }
    }
}
