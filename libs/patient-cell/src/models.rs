use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    /// Digits only, country code included (e.g. `5511999998888`).
    pub whatsapp_number: String,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub insurance: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub continuous_medications: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn age(&self) -> Option<u32> {
        let today = Utc::now().date_naive();
        self.birth_date.and_then(|birth| today.years_since(birth))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub full_name: String,
    pub whatsapp_number: String,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub insurance: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub continuous_medications: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub cpf: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub insurance: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
    pub continuous_medications: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// Keeps only the digits of a phone number.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("A patient with WhatsApp number {0} already exists")]
    DuplicateWhatsapp(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::DuplicateWhatsapp(_) => AppError::Conflict(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
        }
    }
}
