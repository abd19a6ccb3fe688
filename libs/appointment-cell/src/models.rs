// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub patient_name: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub patient_cpf: Option<String>,
    pub doctor_id: Uuid,
    pub specialty_id: Option<Uuid>,
    pub appointment_type: AppointmentType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub insurance_used: Option<String>,
    pub price: Option<f64>,
    pub google_event_id: Option<String>,
    #[serde(default)]
    pub confirmed_by_patient: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reminder_sent: bool,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub booked_via: BookedVia,
    pub booked_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn is_future(&self) -> bool {
        self.start_time > Utc::now()
    }

    /// Whether the appointment falls on today's date in the clinic's timezone.
    pub fn is_today(&self, offset: FixedOffset) -> bool {
        self.start_time.with_timezone(&offset).date_naive()
            == Utc::now().with_timezone(&offset).date_naive()
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }

    /// Pending and confirmed appointments hold their slot.
    pub fn blocks_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    #[default]
    Consultation,
    Return,
    Exam,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookedVia {
    Chatbot,
    #[default]
    Phone,
    InPerson,
    Web,
}

impl BookedVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookedVia::Chatbot => "chatbot",
            BookedVia::Phone => "phone",
            BookedVia::InPerson => "in_person",
            BookedVia::Web => "web",
        }
    }
}

// ==============================================================================
// HISTORY
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Confirmed,
    Cancelled,
    Rescheduled,
    Completed,
    NoShow,
    ReminderSent,
}

impl HistoryAction {
    /// The history entry written when an appointment enters `status`.
    pub fn for_status(status: AppointmentStatus) -> Self {
        match status {
            AppointmentStatus::Pending => HistoryAction::Created,
            AppointmentStatus::Confirmed => HistoryAction::Confirmed,
            AppointmentStatus::Cancelled => HistoryAction::Cancelled,
            AppointmentStatus::Completed => HistoryAction::Completed,
            AppointmentStatus::NoShow => HistoryAction::NoShow,
            AppointmentStatus::Rescheduled => HistoryAction::Rescheduled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentHistory {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub action: HistoryAction,
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub previous_start_time: Option<DateTime<Utc>>,
    pub previous_doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct NewHistoryEntry {
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub previous_start_time: Option<DateTime<Utc>>,
    pub previous_doctor_id: Option<Uuid>,
}

// ==============================================================================
// SCHEDULE BLOCKS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleBlockKind {
    Holiday,
    Maintenance,
    Meeting,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleBlock {
    pub id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub kind: ScheduleBlockKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub applies_to_all_doctors: bool,
    pub created_by: Option<String>,
}

impl ScheduleBlock {
    pub fn affects(&self, doctor_id: Uuid) -> bool {
        self.applies_to_all_doctors || self.doctor_id == Some(doctor_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleBlockRequest {
    pub doctor_id: Option<Uuid>,
    pub kind: ScheduleBlockKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub applies_to_all_doctors: bool,
}

impl CreateScheduleBlockRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if self.end_time <= self.start_time {
            return Err(AppointmentError::InvalidTime(
                "Block end must be after its start".to_string(),
            ));
        }
        if self.doctor_id.is_none() && !self.applies_to_all_doctors {
            return Err(AppointmentError::ValidationError(
                "A block needs a doctor or must apply to all doctors".to_string(),
            ));
        }
        Ok(())
    }
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlot {
    /// Clinic-local start, `HH:MM`.
    pub time: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub available: bool,
}

/// A period that removes slots from a doctor's day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusyPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyPeriod {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && self.end > start
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub patient_email: Option<String>,
    pub patient_cpf: Option<String>,
    pub doctor_id: Uuid,
    pub specialty_id: Option<Uuid>,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub start_time: DateTime<Utc>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub insurance_used: Option<String>,
    pub price: Option<f64>,
    #[serde(default)]
    pub booked_via: BookedVia,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: DateTime<Utc>,
    pub new_doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentFilters {
    pub doctor_id: Option<Uuid>,
    pub patient_phone: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Schedule block not found")]
    BlockNotFound,

    #[error("The requested time is no longer available")]
    SlotUnavailable,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::BlockNotFound => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::SlotUnavailable | AppointmentError::InvalidStatusTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            AppointmentError::InvalidTime(msg) | AppointmentError::ValidationError(msg) => {
                AppError::ValidationError(msg)
            }
        }
    }
}
