use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateUnavailabilityRequest, CreateWorkingHoursRequest, DoctorError,
    DoctorUnavailability, WorkingHours,
};

pub struct WorkingHoursService {
    supabase: SupabaseClient,
}

impl WorkingHoursService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_working_hours(&self, doctor_id: Uuid, auth_token: &str) -> Result<Vec<WorkingHours>> {
        let path = format!(
            "/rest/v1/working_hours?doctor_id=eq.{}&order=weekday.asc,start_time.asc",
            doctor_id
        );
        self.supabase.select(&path, auth_token).await
    }

    /// Every active block across all doctors.
    pub async fn list_active_working_hours(&self, auth_token: &str) -> Result<Vec<WorkingHours>> {
        self.supabase
            .select(
                "/rest/v1/working_hours?active=eq.true&order=doctor_id.asc,weekday.asc,start_time.asc",
                auth_token,
            )
            .await
    }

    /// Active blocks for one ISO weekday, ordered by start time.
    pub async fn get_working_hours_for_weekday(
        &self,
        doctor_id: Uuid,
        weekday: i32,
        auth_token: &str,
    ) -> Result<Vec<WorkingHours>> {
        let path = format!(
            "/rest/v1/working_hours?doctor_id=eq.{}&weekday=eq.{}&active=eq.true&order=start_time.asc",
            doctor_id, weekday
        );
        let mut hours: Vec<WorkingHours> = self.supabase.select(&path, auth_token).await?;
        hours.sort_by_key(|h| h.start_time);
        Ok(hours)
    }

    pub async fn create_working_hours(
        &self,
        doctor_id: Uuid,
        request: CreateWorkingHoursRequest,
        auth_token: &str,
    ) -> Result<WorkingHours> {
        request.validate()?;

        let duplicate_path = format!(
            "/rest/v1/working_hours?doctor_id=eq.{}&weekday=eq.{}&start_time=eq.{}",
            doctor_id,
            request.weekday,
            request.start_time.format("%H:%M:%S")
        );
        let duplicates: Vec<WorkingHours> = self.supabase.select(&duplicate_path, auth_token).await?;
        if !duplicates.is_empty() {
            return Err(DoctorError::DuplicateWorkingHours(request.start_time).into());
        }

        let hours: WorkingHours = self
            .supabase
            .insert(
                "working_hours",
                auth_token,
                json!({
                    "doctor_id": doctor_id,
                    "weekday": request.weekday,
                    "start_time": request.start_time.format("%H:%M:%S").to_string(),
                    "end_time": request.end_time.format("%H:%M:%S").to_string(),
                    "active": true
                }),
            )
            .await?;

        info!(
            "Working hours {} created for doctor {} (weekday {})",
            hours.id, doctor_id, hours.weekday
        );
        Ok(hours)
    }

    pub async fn delete_working_hours(
        &self,
        doctor_id: Uuid,
        working_hours_id: Uuid,
        auth_token: &str,
    ) -> Result<()> {
        let path = format!(
            "/rest/v1/working_hours?id=eq.{}&doctor_id=eq.{}",
            working_hours_id, doctor_id
        );
        let existing: Option<WorkingHours> = self.supabase.select_one(&path, auth_token).await?;
        if existing.is_none() {
            return Err(DoctorError::WorkingHoursNotFound.into());
        }

        let filter = format!("id=eq.{}", working_hours_id);
        self.supabase.delete("working_hours", &filter, auth_token).await?;
        debug!("Working hours {} deleted", working_hours_id);
        Ok(())
    }

    pub async fn create_unavailability(
        &self,
        doctor_id: Uuid,
        request: CreateUnavailabilityRequest,
        auth_token: &str,
    ) -> Result<DoctorUnavailability> {
        if request.end_date < request.start_date {
            return Err(DoctorError::ValidationError(
                "End date cannot be before start date".to_string(),
            )
            .into());
        }

        let unavailability: DoctorUnavailability = self
            .supabase
            .insert(
                "doctor_unavailability",
                auth_token,
                json!({
                    "doctor_id": doctor_id,
                    "kind": request.kind,
                    "start_date": request.start_date,
                    "end_date": request.end_date,
                    "reason": request.reason
                }),
            )
            .await?;

        info!(
            "Doctor {} unavailable from {} to {}",
            doctor_id, unavailability.start_date, unavailability.end_date
        );
        Ok(unavailability)
    }

    pub async fn list_unavailability(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<DoctorUnavailability>> {
        let path = format!(
            "/rest/v1/doctor_unavailability?doctor_id=eq.{}&order=start_date.asc",
            doctor_id
        );
        self.supabase.select(&path, auth_token).await
    }

    pub async fn is_unavailable_on(&self, doctor_id: Uuid, date: NaiveDate, auth_token: &str) -> Result<bool> {
        let path = format!(
            "/rest/v1/doctor_unavailability?doctor_id=eq.{}&start_date=lte.{}&end_date=gte.{}",
            doctor_id, date, date
        );
        let periods: Vec<DoctorUnavailability> = self.supabase.select(&path, auth_token).await?;
        Ok(periods.iter().any(|p| p.covers(date)))
    }
}
