use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CLINIC PROFILE
// ==============================================================================

/// The single clinic profile row. The chatbot prompt is assembled from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicInfo {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub general_goal: String,
    #[serde(default)]
    pub secretary_name: String,
    #[serde(default)]
    pub contact_phone: String,
    pub whatsapp_number: Option<String>,
    #[serde(default)]
    pub address: String,
    pub location_reference: Option<String>,
    pub scheduling_policy: Option<String>,
    pub opening_hours: Option<String>,
    #[serde(default)]
    pub accepted_insurances: Vec<String>,
    pub private_consultation_price: Option<f64>,
    pub google_calendar_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertClinicInfoRequest {
    pub name: String,
    pub general_goal: Option<String>,
    pub secretary_name: Option<String>,
    pub contact_phone: Option<String>,
    pub whatsapp_number: Option<String>,
    pub address: Option<String>,
    pub location_reference: Option<String>,
    pub scheduling_policy: Option<String>,
    pub opening_hours: Option<String>,
    pub accepted_insurances: Option<Vec<String>>,
    pub private_consultation_price: Option<f64>,
    pub google_calendar_id: Option<String>,
}

// ==============================================================================
// SPECIALTIES AND EXAMS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSpecialtyRequest {
    pub name: String,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSpecialtyRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub what_it_is: String,
    #[serde(default)]
    pub how_it_works: String,
    pub preparation: Option<String>,
    pub advantage: Option<String>,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExamRequest {
    pub name: String,
    pub what_it_is: String,
    pub how_it_works: String,
    pub preparation: Option<String>,
    pub advantage: Option<String>,
    pub price: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateExamRequest {
    pub name: Option<String>,
    pub what_it_is: Option<String>,
    pub how_it_works: Option<String>,
    pub preparation: Option<String>,
    pub advantage: Option<String>,
    pub price: Option<f64>,
}

fn default_true() -> bool {
    true
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Clinic information has not been configured")]
    InfoNotConfigured,

    #[error("Specialty not found")]
    SpecialtyNotFound,

    #[error("Exam not found")]
    ExamNotFound,

    #[error("Specialty '{0}' already exists")]
    DuplicateSpecialty(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ClinicError> for AppError {
    fn from(err: ClinicError) -> Self {
        match err {
            ClinicError::InfoNotConfigured
            | ClinicError::SpecialtyNotFound
            | ClinicError::ExamNotFound => AppError::NotFound(err.to_string()),
            ClinicError::DuplicateSpecialty(_) => AppError::Conflict(err.to_string()),
            ClinicError::ValidationError(msg) => AppError::ValidationError(msg),
        }
    }
}
