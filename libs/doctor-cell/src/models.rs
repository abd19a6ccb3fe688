use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// DOCTOR PROFILE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub crm: String,
    /// Specialty names, resolved through `doctor_specialties`.
    #[serde(default, deserialize_with = "specialty_names")]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub bio: String,
    pub education: Option<String>,
    #[serde(default)]
    pub insurances: Vec<String>,
    #[serde(default = "default_true")]
    pub accepts_private: bool,
    pub consultation_price: f64,
    pub return_price: Option<f64>,
    #[serde(default)]
    pub payment_methods: String,
    #[serde(default)]
    pub return_info: String,
    #[serde(default = "default_consultation_minutes")]
    pub consultation_minutes: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    pub professional_email: Option<String>,
    pub professional_phone: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Doctor {
    pub fn specialties_display(&self) -> String {
        self.specialties.join(", ")
    }

    /// Price charged for a return visit, falling back to the consultation price.
    pub fn price_for_return(&self) -> f64 {
        self.return_price.unwrap_or(self.consultation_price)
    }
}

/// Accepts plain names or the embedded shape PostgREST returns for
/// `specialties:doctor_specialties(specialties(name))`.
fn specialty_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name),
            Value::Object(map) => map
                .get("name")
                .and_then(Value::as_str)
                .or_else(|| {
                    map.get("specialties")
                        .and_then(|nested| nested.get("name"))
                        .and_then(Value::as_str)
                })
                .map(str::to_string),
            _ => None,
        })
        .collect())
}

fn default_true() -> bool {
    true
}

fn default_consultation_minutes() -> i32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub crm: String,
    pub bio: Option<String>,
    pub education: Option<String>,
    pub insurances: Option<Vec<String>>,
    pub accepts_private: Option<bool>,
    pub consultation_price: f64,
    pub return_price: Option<f64>,
    pub payment_methods: Option<String>,
    pub return_info: Option<String>,
    pub consultation_minutes: Option<i32>,
    pub professional_email: Option<String>,
    pub professional_phone: Option<String>,
    #[serde(default)]
    pub specialty_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub education: Option<String>,
    pub insurances: Option<Vec<String>>,
    pub accepts_private: Option<bool>,
    pub consultation_price: Option<f64>,
    pub return_price: Option<f64>,
    pub payment_methods: Option<String>,
    pub return_info: Option<String>,
    pub consultation_minutes: Option<i32>,
    pub active: Option<bool>,
    pub professional_email: Option<String>,
    pub professional_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetSpecialtiesRequest {
    pub specialty_ids: Vec<Uuid>,
}

// ==============================================================================
// WORKING HOURS AND UNAVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub id: Uuid,
    pub doctor_id: Uuid,
    /// ISO weekday, 1 = Monday .. 7 = Sunday.
    pub weekday: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkingHoursRequest {
    pub weekday: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl CreateWorkingHoursRequest {
    pub fn validate(&self) -> Result<(), DoctorError> {
        if !(1..=7).contains(&self.weekday) {
            return Err(DoctorError::ValidationError(format!(
                "Weekday must be between 1 (Monday) and 7 (Sunday), got {}",
                self.weekday
            )));
        }
        if self.end_time <= self.start_time {
            return Err(DoctorError::ValidationError(
                "End time must be after start time".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailabilityKind {
    Vacation,
    Conference,
    Leave,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorUnavailability {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub kind: UnavailabilityKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl DoctorUnavailability {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUnavailabilityRequest {
    pub kind: UnavailabilityKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

/// ISO weekday number used by `working_hours.weekday`.
pub fn weekday_number(date: NaiveDate) -> i32 {
    date.weekday().number_from_monday() as i32
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("A doctor with CRM {0} already exists")]
    DuplicateCrm(String),

    #[error("Working hours not found")]
    WorkingHoursNotFound,

    #[error("Working hours starting at {0} already exist for this weekday")]
    DuplicateWorkingHours(NaiveTime),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound | DoctorError::WorkingHoursNotFound => {
                AppError::NotFound(err.to_string())
            }
            DoctorError::DuplicateCrm(_) | DoctorError::DuplicateWorkingHours(_) => {
                AppError::Conflict(err.to_string())
            }
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        }
    }
}
